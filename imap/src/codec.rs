use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

use crate::parser::{Decoded, decode};
use crate::types::Response;

// Upper bound on what one decode call reserves ahead of the data; the
// buffer grows past it as bytes actually arrive.
const MAX_RESERVE: usize = 64 * 1024;

/// Frames complete responses (literals included) off the byte stream.
#[derive(Debug, Default)]
pub(crate) struct ImapCodec {
    // Buffer length below which another parse attempt cannot succeed.
    // Large literals arrive over many reads; without this every read would
    // re-parse the message from its first byte.
    min_len: usize,
}

impl Decoder for ImapCodec {
    type Item = Response;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() || src.len() < self.min_len {
            return Ok(None);
        }

        match decode(src).map_err(std::io::Error::other)? {
            Decoded::Response(resp, consumed) => {
                src.advance(consumed);
                self.min_len = 0;
                Ok(Some(resp))
            }
            Decoded::Incomplete(needed) => {
                self.min_len = src.len().saturating_add(needed);
                src.reserve(needed.min(MAX_RESERVE));
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FetchItem, Status};

    #[test]
    fn test_decodes_back_to_back_responses() {
        let mut codec = ImapCodec::default();
        let mut buf = BytesMut::from(&b"* SEARCH 1 2\r\nA0003 OK SEARCH completed\r\n"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Response::Search(vec![1, 2])));
        assert!(matches!(
            codec.decode(&mut buf).unwrap(),
            Some(Response::Tagged { status: Status::Ok, .. })
        ));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_literal_split_across_reads() {
        let mut codec = ImapCodec::default();
        let mut buf = BytesMut::from(&b"* 1 FETCH (UID 4 BODY[] {11}\r\nHello"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b" wor");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b"ld)\r\n");
        let resp = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(
            resp,
            Response::Fetch {
                seq: 1,
                items: vec![
                    FetchItem::Uid(4),
                    FetchItem::Body(Some(bytes::Bytes::from_static(b"Hello world"))),
                ],
            }
        );
    }

    #[test]
    fn test_huge_literal_does_not_reserve_up_front() {
        let mut codec = ImapCodec::default();
        let mut buf = BytesMut::from(&b"* 1 FETCH (UID 4 BODY[] {4294967295}\r\nab"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.capacity() <= buf.len() + MAX_RESERVE);
    }

    #[test]
    fn test_invalid_data_is_an_io_error() {
        let mut codec = ImapCodec::default();
        let mut buf = BytesMut::from(&b"??? what\r\n"[..]);
        let err = codec.decode(&mut buf).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::Other);
    }
}
