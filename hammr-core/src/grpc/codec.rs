use prost::Message as _;
use prost_reflect::{DynamicMessage, MessageDescriptor};

/// A tonic codec for schema-driven calls: requests are encoded from
/// dynamic messages and responses decoded against the method's output
/// descriptor.
#[derive(Debug, Clone)]
pub(crate) struct DynamicCodec {
    reply: MessageDescriptor,
}

impl DynamicCodec {
    pub(crate) fn new(reply: MessageDescriptor) -> Self {
        Self { reply }
    }
}

impl tonic::codec::Codec for DynamicCodec {
    type Encode = DynamicMessage;
    type Decode = DynamicMessage;
    type Encoder = DynamicEncoder;
    type Decoder = DynamicDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        DynamicEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        DynamicDecoder {
            reply: self.reply.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct DynamicEncoder;

impl tonic::codec::Encoder for DynamicEncoder {
    type Item = DynamicMessage;
    type Error = tonic::Status;

    fn encode(
        &mut self,
        item: Self::Item,
        dst: &mut tonic::codec::EncodeBuf<'_>,
    ) -> std::result::Result<(), Self::Error> {
        item.encode(dst)
            .map_err(|err| tonic::Status::internal(err.to_string()))?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct DynamicDecoder {
    reply: MessageDescriptor,
}

impl tonic::codec::Decoder for DynamicDecoder {
    type Item = DynamicMessage;
    type Error = tonic::Status;

    fn decode(
        &mut self,
        src: &mut tonic::codec::DecodeBuf<'_>,
    ) -> std::result::Result<Option<Self::Item>, Self::Error> {
        // A zero-length buffer is a valid (all-default) message.
        let msg = DynamicMessage::decode(self.reply.clone(), &mut *src)
            .map_err(|err| tonic::Status::internal(err.to_string()))?;
        Ok(Some(msg))
    }
}
