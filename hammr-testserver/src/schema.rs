use prost_types::{
    field_descriptor_proto, DescriptorProto, FieldDescriptorProto, FileDescriptorProto,
    FileDescriptorSet, MethodDescriptorProto, ServiceDescriptorProto,
};

pub const SERVICE_NAME: &str = "hammr.test.EchoService";

/// Wire messages for the echo service, written out by hand so the
/// crate needs neither protoc nor a build script.
#[derive(Clone, PartialEq, prost::Message)]
pub struct EchoRequest {
    #[prost(string, tag = "1")]
    pub message: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct EchoResponse {
    #[prost(string, tag = "1")]
    pub message: String,
}

/// Descriptor pool describing the test service, equivalent to what
/// compiling the matching `.proto` file would produce.
pub fn descriptor_pool() -> prost_reflect::DescriptorPool {
    prost_reflect::DescriptorPool::from_file_descriptor_set(file_descriptor_set())
        .expect("test descriptor set is valid")
}

pub fn file_descriptor_set() -> FileDescriptorSet {
    FileDescriptorSet {
        file: vec![FileDescriptorProto {
            name: Some("hammr_test.proto".to_string()),
            package: Some("hammr.test".to_string()),
            syntax: Some("proto3".to_string()),
            message_type: vec![string_message("EchoRequest"), string_message("EchoResponse")],
            service: vec![ServiceDescriptorProto {
                name: Some("EchoService".to_string()),
                method: vec![
                    method("Echo", false, false),
                    method("Collect", true, false),
                    method("Expand", false, true),
                    method("Chat", true, true),
                ],
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

fn string_message(name: &str) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: vec![FieldDescriptorProto {
            name: Some("message".to_string()),
            json_name: Some("message".to_string()),
            number: Some(1),
            label: Some(field_descriptor_proto::Label::Optional as i32),
            r#type: Some(field_descriptor_proto::Type::String as i32),
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn method(name: &str, client_streaming: bool, server_streaming: bool) -> MethodDescriptorProto {
    MethodDescriptorProto {
        name: Some(name.to_string()),
        input_type: Some(".hammr.test.EchoRequest".to_string()),
        output_type: Some(".hammr.test.EchoResponse".to_string()),
        client_streaming: Some(client_streaming),
        server_streaming: Some(server_streaming),
        ..Default::default()
    }
}
