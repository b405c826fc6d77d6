//! Per-operation encoders and decoders.
//!
//! Every `read` follows the same contract:
//! - `Ok(None)` if no complete message is available (nothing is consumed)
//! - `Err(UnexpectedMessageType)` if the header carries another type
//! - `Ok(Some(body))` otherwise, with the cursor past the body

use tracing::debug;

use crate::buffer::{wire_len, ByteBuffer};
use crate::constants::{
    CRDT_MESSAGE_HEADER_LENGTH, DELETE_COMPONENT_HEADER_LENGTH, DELETE_ENTITY_HEADER_LENGTH,
    PUT_COMPONENT_HEADER_LENGTH,
};
use crate::error::{ProtocolError, ProtocolResult};
use crate::ids::{ComponentId, Entity};

use super::message::{
    AppendValueMessage, CrdtMessage, DeleteComponentMessage, DeleteEntityMessage,
    PutComponentMessage,
};
use super::{get_header, read_header, CrdtMessageHeader, CrdtMessageType};

fn write_header(buf: &mut ByteBuffer, message_type: CrdtMessageType, body_len: usize) {
    buf.write_u32(wire_len(CRDT_MESSAGE_HEADER_LENGTH + body_len));
    buf.write_u32(message_type as u32);
}

fn read_expected(
    buf: &mut ByteBuffer,
    expected: CrdtMessageType,
) -> ProtocolResult<Option<CrdtMessageHeader>> {
    let Some(header) = read_header(buf) else {
        return Ok(None);
    };
    if header.message_type != expected as u32 {
        return Err(ProtocolError::UnexpectedMessageType {
            expected,
            found: header.message_type,
        });
    }
    Ok(Some(header))
}

fn write_data_message(
    buf: &mut ByteBuffer,
    message_type: CrdtMessageType,
    entity: Entity,
    component_id: ComponentId,
    timestamp: u32,
    data: &[u8],
) {
    write_header(buf, message_type, PUT_COMPONENT_HEADER_LENGTH + data.len());
    buf.write_u32(entity.raw());
    buf.write_u32(component_id.0);
    buf.write_u32(timestamp);
    buf.write_bytes(data, true);
}

/// PUT_COMPONENT codec.
pub struct PutComponent;

impl PutComponent {
    /// Encodes a PUT_COMPONENT message.
    pub fn write(
        entity: Entity,
        timestamp: u32,
        component_id: ComponentId,
        data: &[u8],
        buf: &mut ByteBuffer,
    ) {
        write_data_message(
            buf,
            CrdtMessageType::PutComponent,
            entity,
            component_id,
            timestamp,
            data,
        );
    }

    /// Decodes a PUT_COMPONENT message.
    ///
    /// # Errors
    ///
    /// See the module docs.
    pub fn read(buf: &mut ByteBuffer) -> ProtocolResult<Option<PutComponentMessage>> {
        if read_expected(buf, CrdtMessageType::PutComponent)?.is_none() {
            return Ok(None);
        }
        Ok(Some(PutComponentMessage {
            entity: Entity::from_raw(buf.read_u32()?),
            component_id: ComponentId(buf.read_u32()?),
            timestamp: buf.read_u32()?,
            data: buf.read_bytes()?,
        }))
    }
}

/// DELETE_COMPONENT codec.
pub struct DeleteComponent;

impl DeleteComponent {
    /// Encodes a DELETE_COMPONENT message.
    pub fn write(entity: Entity, component_id: ComponentId, timestamp: u32, buf: &mut ByteBuffer) {
        write_header(
            buf,
            CrdtMessageType::DeleteComponent,
            DELETE_COMPONENT_HEADER_LENGTH,
        );
        buf.write_u32(entity.raw());
        buf.write_u32(component_id.0);
        buf.write_u32(timestamp);
    }

    /// Decodes a DELETE_COMPONENT message.
    ///
    /// # Errors
    ///
    /// See the module docs.
    pub fn read(buf: &mut ByteBuffer) -> ProtocolResult<Option<DeleteComponentMessage>> {
        if read_expected(buf, CrdtMessageType::DeleteComponent)?.is_none() {
            return Ok(None);
        }
        Ok(Some(DeleteComponentMessage {
            entity: Entity::from_raw(buf.read_u32()?),
            component_id: ComponentId(buf.read_u32()?),
            timestamp: buf.read_u32()?,
        }))
    }
}

/// DELETE_ENTITY codec.
pub struct DeleteEntity;

impl DeleteEntity {
    /// Encodes a DELETE_ENTITY message.
    pub fn write(entity: Entity, buf: &mut ByteBuffer) {
        write_header(buf, CrdtMessageType::DeleteEntity, DELETE_ENTITY_HEADER_LENGTH);
        buf.write_u32(entity.raw());
    }

    /// Decodes a DELETE_ENTITY message.
    ///
    /// # Errors
    ///
    /// See the module docs.
    pub fn read(buf: &mut ByteBuffer) -> ProtocolResult<Option<DeleteEntityMessage>> {
        if read_expected(buf, CrdtMessageType::DeleteEntity)?.is_none() {
            return Ok(None);
        }
        Ok(Some(DeleteEntityMessage {
            entity: Entity::from_raw(buf.read_u32()?),
        }))
    }
}

/// APPEND_VALUE codec. Same body layout as PUT_COMPONENT.
pub struct AppendValue;

impl AppendValue {
    /// Encodes an APPEND_VALUE message.
    pub fn write(
        entity: Entity,
        timestamp: u32,
        component_id: ComponentId,
        data: &[u8],
        buf: &mut ByteBuffer,
    ) {
        write_data_message(
            buf,
            CrdtMessageType::AppendValue,
            entity,
            component_id,
            timestamp,
            data,
        );
    }

    /// Decodes an APPEND_VALUE message.
    ///
    /// # Errors
    ///
    /// See the module docs.
    pub fn read(buf: &mut ByteBuffer) -> ProtocolResult<Option<AppendValueMessage>> {
        if read_expected(buf, CrdtMessageType::AppendValue)?.is_none() {
            return Ok(None);
        }
        Ok(Some(AppendValueMessage {
            entity: Entity::from_raw(buf.read_u32()?),
            component_id: ComponentId(buf.read_u32()?),
            timestamp: buf.read_u32()?,
            data: buf.read_bytes()?,
        }))
    }
}

/// A decoded message together with the exact bytes it arrived as.
///
/// Keeping the raw bytes lets a relay forward a message verbatim instead of
/// re-encoding it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Decoded message.
    pub message: CrdtMessage,
    /// Raw frame bytes, header included.
    pub raw: Vec<u8>,
}

/// Reads the next known message from `buf`.
///
/// Messages with unknown or reserved type tags are skipped. The cursor always
/// advances by the declared frame length, even if the body decoder used fewer
/// bytes. Returns `Ok(None)` once no complete message remains.
///
/// # Errors
///
/// Returns an error if a frame's body is shorter than its type requires. The
/// offending frame has already been consumed, so the caller may keep reading.
pub fn read_message(buf: &mut ByteBuffer) -> ProtocolResult<Option<Frame>> {
    while let Some(header) = get_header(buf) {
        let mut frame = ByteBuffer::from(buf.read_raw(header.length as usize)?);

        let message = match header.kind() {
            Some(CrdtMessageType::PutComponent) => {
                PutComponent::read(&mut frame)?.map(CrdtMessage::PutComponent)
            }
            Some(CrdtMessageType::DeleteComponent) => {
                DeleteComponent::read(&mut frame)?.map(CrdtMessage::DeleteComponent)
            }
            Some(CrdtMessageType::DeleteEntity) => {
                DeleteEntity::read(&mut frame)?.map(CrdtMessage::DeleteEntity)
            }
            Some(CrdtMessageType::AppendValue) => {
                AppendValue::read(&mut frame)?.map(CrdtMessage::AppendValue)
            }
            Some(CrdtMessageType::Reserved) | None => {
                debug!(
                    message_type = header.message_type,
                    length = header.length,
                    "skipping unknown crdt message"
                );
                None
            }
        };

        if let Some(message) = message {
            return Ok(Some(Frame {
                message,
                raw: frame.into_vec(),
            }));
        }
    }

    if buf.remaining_bytes() > 0 {
        debug!(
            remaining = buf.remaining_bytes(),
            "trailing bytes do not form a complete crdt message"
        );
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entity() -> Entity {
        Entity::new(512, 2)
    }

    #[test]
    fn test_put_component_layout() {
        let mut buf = ByteBuffer::new();
        PutComponent::write(entity(), 7, ComponentId(1), &[0xAB, 0xCD], &mut buf);

        assert_eq!(buf.write_offset(), 8 + 16 + 2);
        assert_eq!(buf.get_u32(0), Ok(26));
        assert_eq!(buf.get_u32(4), Ok(1));
        assert_eq!(buf.get_u32(8), Ok(entity().raw()));
        assert_eq!(buf.get_u32(12), Ok(1));
        assert_eq!(buf.get_u32(16), Ok(7));
        assert_eq!(buf.get_u32(20), Ok(2));
        assert_eq!(&buf.as_slice()[24..], &[0xAB, 0xCD]);

        let read = PutComponent::read(&mut buf).unwrap().unwrap();
        assert_eq!(read.data, vec![0xAB, 0xCD]);
        assert_eq!(read.timestamp, 7);
        assert_eq!(buf.remaining_bytes(), 0);
    }

    #[test]
    fn test_delete_component_and_entity_lengths() {
        let mut buf = ByteBuffer::new();
        DeleteComponent::write(entity(), ComponentId(1017), 3, &mut buf);
        DeleteEntity::write(entity(), &mut buf);

        assert_eq!(buf.get_u32(0), Ok(20));
        assert_eq!(buf.get_u32(20), Ok(12));

        let del = DeleteComponent::read(&mut buf).unwrap().unwrap();
        assert_eq!(del.component_id, ComponentId(1017));
        assert_eq!(del.timestamp, 3);
        let gone = DeleteEntity::read(&mut buf).unwrap().unwrap();
        assert_eq!(gone.entity, entity());
    }

    #[test]
    fn test_append_value_shares_put_layout() {
        let mut put = ByteBuffer::new();
        let mut append = ByteBuffer::new();
        PutComponent::write(entity(), 0, ComponentId(9), &[1, 2, 3], &mut put);
        AppendValue::write(entity(), 0, ComponentId(9), &[1, 2, 3], &mut append);

        assert_eq!(put.get_u32(4), Ok(1));
        assert_eq!(append.get_u32(4), Ok(4));
        assert_eq!(&put.as_slice()[8..], &append.as_slice()[8..]);
    }

    #[test]
    fn test_read_incomplete_returns_none() {
        let mut full = ByteBuffer::new();
        PutComponent::write(entity(), 1, ComponentId(1), &[1, 2, 3, 4], &mut full);
        let mut partial = ByteBuffer::from(&full.as_slice()[..20]);

        assert_eq!(PutComponent::read(&mut partial), Ok(None));
        assert_eq!(partial.read_offset(), 0);
    }

    #[test]
    fn test_read_wrong_type_is_error() {
        let mut buf = ByteBuffer::new();
        DeleteEntity::write(entity(), &mut buf);

        let err = PutComponent::read(&mut buf).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::UnexpectedMessageType {
                expected: CrdtMessageType::PutComponent,
                found: 3
            }
        );
    }

    #[test]
    fn test_read_message_skips_unknown_types() {
        let mut buf = ByteBuffer::new();
        buf.write_u32(12);
        buf.write_u32(6);
        buf.write_u32(0xFFFF_FFFF);
        DeleteEntity::write(entity(), &mut buf);

        let frame = read_message(&mut buf).unwrap().unwrap();
        assert_eq!(frame.message, CrdtMessage::delete_entity(entity()));
        assert_eq!(frame.raw.len(), 12);
        assert_eq!(read_message(&mut buf), Ok(None));
    }

    #[test]
    fn test_read_message_honours_declared_length() {
        let mut buf = ByteBuffer::new();
        buf.write_u32(16);
        buf.write_u32(CrdtMessageType::DeleteEntity as u32);
        buf.write_u32(entity().raw());
        buf.write_u32(0xDEAD_BEEF);
        DeleteComponent::write(entity(), ComponentId(2), 5, &mut buf);

        let first = read_message(&mut buf).unwrap().unwrap();
        assert_eq!(first.raw.len(), 16);
        let second = read_message(&mut buf).unwrap().unwrap();
        assert_eq!(second.message, CrdtMessage::delete(entity(), ComponentId(2), 5));
    }

    #[test]
    fn test_read_message_truncated_body_consumes_frame() {
        let mut buf = ByteBuffer::new();
        buf.write_u32(12);
        buf.write_u32(CrdtMessageType::PutComponent as u32);
        buf.write_u32(entity().raw());
        DeleteEntity::write(entity(), &mut buf);

        assert!(matches!(
            read_message(&mut buf),
            Err(ProtocolError::Buffer(_))
        ));
        let next = read_message(&mut buf).unwrap().unwrap();
        assert_eq!(next.message, CrdtMessage::delete_entity(entity()));
    }

    #[test]
    fn test_raw_bytes_match_encoding() {
        let message = CrdtMessage::append(entity(), ComponentId(1209), 0, vec![5; 10]);
        let mut buf = ByteBuffer::from(message.to_bytes());
        let frame = read_message(&mut buf).unwrap().unwrap();
        assert_eq!(frame.raw, message.to_bytes());
        assert_eq!(frame.message, message);
    }

    #[test]
    fn test_empty_payloads_survive_encoding() {
        let mut buf = ByteBuffer::new();
        PutComponent::write(entity(), 4, ComponentId(1), &[], &mut buf);
        AppendValue::write(entity(), 0, ComponentId(1063), &[], &mut buf);
        assert_eq!(buf.get_u32(0), Ok(24));

        let put = PutComponent::read(&mut buf).unwrap().unwrap();
        assert!(put.data.is_empty());
        let append = AppendValue::read(&mut buf).unwrap().unwrap();
        assert!(append.data.is_empty());
        assert_eq!(buf.remaining_bytes(), 0);
    }

    proptest! {
        #[test]
        fn prop_every_operation_decodes_what_it_encoded(
            number in any::<u16>(),
            version in any::<u16>(),
            component in any::<u32>(),
            timestamp in any::<u32>(),
            data in prop::collection::vec(any::<u8>(), 0..16),
        ) {
            let entity = Entity::new(number, version);
            let component_id = ComponentId(component);
            let mut buf = ByteBuffer::new();
            PutComponent::write(entity, timestamp, component_id, &data, &mut buf);
            DeleteComponent::write(entity, component_id, timestamp, &mut buf);
            DeleteEntity::write(entity, &mut buf);
            AppendValue::write(entity, timestamp, component_id, &data, &mut buf);

            let put = PutComponent::read(&mut buf).unwrap().unwrap();
            prop_assert_eq!(
                (put.entity, put.component_id, put.timestamp, &put.data),
                (entity, component_id, timestamp, &data)
            );
            let delete = DeleteComponent::read(&mut buf).unwrap().unwrap();
            prop_assert_eq!(
                (delete.entity, delete.component_id, delete.timestamp),
                (entity, component_id, timestamp)
            );
            prop_assert_eq!(DeleteEntity::read(&mut buf).unwrap().unwrap().entity, entity);
            let append = AppendValue::read(&mut buf).unwrap().unwrap();
            prop_assert_eq!(
                (append.entity, append.component_id, append.timestamp, &append.data),
                (entity, component_id, timestamp, &data)
            );
            prop_assert_eq!(buf.remaining_bytes(), 0);
        }
    }
}
