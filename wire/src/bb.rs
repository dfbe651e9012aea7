use std::borrow::Cow;

use crate::{error::WireError, BOOL_FALSE, BOOL_TRUE};

/// Largest byte string the three-byte TL length prefix can describe.
pub const MAX_TL_BYTES: usize = 0x00FF_FFFF;

/// A TL byte buffer meant for reading.
///
/// Example usage:
///
/// ```
/// let mut bb = gram_tl_wire::ByteBuffer::new(&[0x15, 0xc4, 0xb5, 0x1c, 2, 0, 0, 0]);
/// assert_eq!(bb.read_uint32(), Ok(gram_tl_wire::VECTOR_TAG));
/// assert_eq!(bb.read_int32(), Ok(2));
/// ```
///
pub struct ByteBuffer<'a> {
    data: &'a [u8],
    index: usize,
}

impl<'a> ByteBuffer<'a> {
    /// Create a new ByteBuffer that wraps the provided byte slice. The lifetime
    /// of the returned ByteBuffer must not outlive the lifetime of the byte
    /// slice.
    pub fn new(data: &'a [u8]) -> ByteBuffer<'a> {
        ByteBuffer { data, index: 0 }
    }

    /// Retrieves the underlying byte slice.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Retrieves the current index into the underlying byte slice. This starts
    /// off as 0 and ends up as `self.data().len()` when everything has been
    /// read.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.index
    }

    /// Try to read a byte starting at the current index.
    pub fn read_byte(&mut self) -> Result<u8, WireError> {
        Ok(self.read_bytes(1)?[0])
    }

    /// Try to read `len` raw bytes starting at the current index.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        if len > self.remaining() {
            return Err(WireError::Underflow {
                needed:    len,
                offset:    self.index,
                available: self.remaining(),
            });
        }
        let value = &self.data[self.index..self.index + len];
        self.index += len;
        Ok(value)
    }

    /// Try to read a little-endian signed 32-bit integer.
    pub fn read_int32(&mut self) -> Result<i32, WireError> {
        Ok(self.read_uint32()? as i32)
    }

    /// Try to read a little-endian unsigned 32-bit integer. Constructor ids
    /// and vector tags are read with this.
    pub fn read_uint32(&mut self) -> Result<u32, WireError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Try to read a little-endian signed 64-bit integer.
    pub fn read_int64(&mut self) -> Result<i64, WireError> {
        let bytes = self.read_bytes(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(i64::from_le_bytes(raw))
    }

    /// Try to read a bool, which TL encodes as the `boolTrue` / `boolFalse`
    /// constructor ids.
    pub fn read_bool(&mut self) -> Result<bool, WireError> {
        match self.read_uint32()? {
            BOOL_TRUE => Ok(true),
            BOOL_FALSE => Ok(false),
            other => Err(WireError::InvalidBool(other)),
        }
    }

    /// Try to read a TL byte string: a one byte length (or `254` followed by a
    /// three byte length), the payload, then zero padding up to a multiple of
    /// four.
    pub fn read_tl_bytes(&mut self) -> Result<&'a [u8], WireError> {
        let first = self.read_byte()?;
        let (len, header) = if first >= 254 {
            let len = self.read_bytes(3)?;
            (
                len[0] as usize | (len[1] as usize) << 8 | (len[2] as usize) << 16,
                4,
            )
        } else {
            (first as usize, 1)
        };

        let value = self.read_bytes(len)?;
        let padding = (len + header) % 4;
        if padding != 0 {
            self.read_bytes(4 - padding)?;
        }
        Ok(value)
    }

    /// Try to read a UTF-8 string stored as TL bytes. Invalid sequences are
    /// replaced rather than rejected.
    pub fn read_string(&mut self) -> Result<Cow<'a, str>, WireError> {
        Ok(String::from_utf8_lossy(self.read_tl_bytes()?))
    }
}

#[test]
fn read_byte() {
    let read = |bytes| ByteBuffer::new(bytes).read_byte();
    assert!(read(&[]).is_err());
    assert_eq!(read(&[0]), Ok(0));
    assert_eq!(read(&[255]), Ok(255));
}

#[test]
fn read_bytes() {
    let mut bb = ByteBuffer::new(&[1, 2, 3, 4, 5]);
    assert_eq!(bb.read_bytes(3), Ok(vec![1, 2, 3].as_slice()));
    assert_eq!(bb.read_bytes(2), Ok(vec![4, 5].as_slice()));
    assert_eq!(
        bb.read_bytes(1),
        Err(WireError::Underflow { needed: 1, offset: 5, available: 0 })
    );
}

#[test]
fn read_int32() {
    let read = |bytes| ByteBuffer::new(bytes).read_int32();
    assert!(read(&[1, 0, 0]).is_err());
    assert_eq!(read(&[0, 0, 0, 0]), Ok(0));
    assert_eq!(read(&[1, 0, 0, 0]), Ok(1));
    assert_eq!(read(&[255, 255, 255, 255]), Ok(-1));
    assert_eq!(read(&[0xbc, 0x36, 0x95, 0x51]), Ok(0x519536bc));
    assert_eq!(read(&[0, 0, 0, 128]), Ok(i32::MIN));
}

#[test]
fn read_int64() {
    let read = |bytes| ByteBuffer::new(bytes).read_int64();
    assert!(read(&[0, 0, 0, 0]).is_err());
    assert_eq!(read(&[1, 0, 0, 0, 0, 0, 0, 0]), Ok(1));
    assert_eq!(read(&[255; 8]), Ok(-1));
    assert_eq!(
        read(&[0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11]),
        Ok(0x1122_3344_5566_7788)
    );
}

#[test]
fn read_bool() {
    let read = |bytes| ByteBuffer::new(bytes).read_bool();
    assert_eq!(read(&[0xb5, 0x75, 0x72, 0x99]), Ok(true));
    assert_eq!(read(&[0x37, 0x97, 0x79, 0xbc]), Ok(false));
    assert_eq!(read(&[1, 0, 0, 0]), Err(WireError::InvalidBool(1)));
}

#[test]
fn read_string() {
    let read = |bytes| ByteBuffer::new(bytes).read_string();
    assert!(read(&[]).is_err());
    assert_eq!(read(&[0, 0, 0, 0]), Ok(Cow::Borrowed("")));
    assert_eq!(read(&[1, 97, 0, 0]), Ok(Cow::Borrowed("a")));
    assert_eq!(read(&[3, 97, 98, 99]), Ok(Cow::Borrowed("abc")));
    assert_eq!(read(&[4, 240, 159, 141, 149, 0, 0, 0]), Ok(Cow::Borrowed("🍕")));
    assert!(read(&[2, 97]).is_err());
}

#[test]
fn read_long_string() {
    let payload = vec![b'x'; 300];
    let mut bytes = vec![254, 0x2c, 0x01, 0x00];
    bytes.extend_from_slice(&payload);
    let mut bb = ByteBuffer::new(&bytes);
    assert_eq!(bb.read_tl_bytes(), Ok(payload.as_slice()));
    assert_eq!(bb.remaining(), 0);
}

/// A TL byte buffer meant for writing.
///
/// Example usage:
///
/// ```
/// let mut bb = gram_tl_wire::ByteBufferMut::new();
/// bb.write_string("a").unwrap();
/// bb.write_int32(1);
/// assert_eq!(bb.data(), [1, 97, 0, 0, 1, 0, 0, 0]);
/// ```
///
#[derive(Debug, Default)]
pub struct ByteBufferMut {
    data: Vec<u8>,
}

impl ByteBufferMut {
    /// Creates an empty ByteBufferMut ready for writing.
    pub fn new() -> ByteBufferMut {
        ByteBufferMut { data: vec![] }
    }

    /// Consumes this buffer and returns the underlying backing store. Use this
    /// to get the data out when you're done writing to the buffer.
    pub fn data(self) -> Vec<u8> {
        self.data
    }

    /// Returns the number of bytes written so far.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Write a byte to the end of the buffer.
    pub fn write_byte(&mut self, value: u8) {
        self.data.push(value);
    }

    /// Write a raw byte slice to the end of the buffer.
    pub fn write_bytes(&mut self, value: &[u8]) {
        self.data.extend_from_slice(value);
    }

    /// Write a little-endian signed 32-bit integer.
    pub fn write_int32(&mut self, value: i32) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Write a little-endian unsigned 32-bit integer.
    pub fn write_uint32(&mut self, value: u32) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Write a little-endian signed 64-bit integer.
    pub fn write_int64(&mut self, value: i64) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Write a bool as its TL constructor id.
    pub fn write_bool(&mut self, value: bool) {
        self.write_uint32(if value { BOOL_TRUE } else { BOOL_FALSE });
    }

    /// Write a TL byte string with its length prefix and padding.
    pub fn write_tl_bytes(&mut self, value: &[u8]) -> Result<(), WireError> {
        let len = value.len();
        let header = if len <= 253 {
            self.write_byte(len as u8);
            1
        } else if len <= MAX_TL_BYTES {
            self.write_bytes(&[254, len as u8, (len >> 8) as u8, (len >> 16) as u8]);
            4
        } else {
            return Err(WireError::LengthOverflow(len));
        };

        self.write_bytes(value);
        let padding = (len + header) % 4;
        if padding != 0 {
            self.write_bytes(&[0; 3][..4 - padding]);
        }
        Ok(())
    }

    /// Write a UTF-8 string as TL bytes.
    pub fn write_string(&mut self, value: &str) -> Result<(), WireError> {
        self.write_tl_bytes(value.as_bytes())
    }
}

#[cfg(test)]
fn write_once(cb: fn(&mut ByteBufferMut)) -> Vec<u8> {
    let mut bb = ByteBufferMut::new();
    cb(&mut bb);
    bb.data()
}

#[test]
fn write_int32() {
    assert_eq!(write_once(|bb| bb.write_int32(0)), [0, 0, 0, 0]);
    assert_eq!(write_once(|bb| bb.write_int32(-1)), [255, 255, 255, 255]);
    assert_eq!(write_once(|bb| bb.write_int32(0x519536bc)), [0xbc, 0x36, 0x95, 0x51]);
}

#[test]
fn write_int64() {
    assert_eq!(
        write_once(|bb| bb.write_int64(0x1122_3344_5566_7788)),
        [0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11]
    );
}

#[test]
fn write_bool() {
    assert_eq!(write_once(|bb| bb.write_bool(true)), [0xb5, 0x75, 0x72, 0x99]);
    assert_eq!(write_once(|bb| bb.write_bool(false)), [0x37, 0x97, 0x79, 0xbc]);
}

#[test]
fn write_string() {
    assert_eq!(write_once(|bb| bb.write_string("").unwrap()), [0, 0, 0, 0]);
    assert_eq!(write_once(|bb| bb.write_string("a").unwrap()), [1, 97, 0, 0]);
    assert_eq!(write_once(|bb| bb.write_string("abc").unwrap()), [3, 97, 98, 99]);
    assert_eq!(
        write_once(|bb| bb.write_string("abcd").unwrap()),
        [4, 97, 98, 99, 100, 0, 0, 0]
    );
}

#[test]
fn write_long_string() {
    let payload = vec![b'x'; 300];
    let mut bb = ByteBufferMut::new();
    bb.write_tl_bytes(&payload).unwrap();
    let data = bb.data();
    assert_eq!(&data[..4], &[254, 0x2c, 0x01, 0x00]);
    assert_eq!(data.len(), 304);
}

#[test]
fn write_sequence() {
    let mut bb = ByteBufferMut::new();
    bb.write_uint32(crate::VECTOR_TAG);
    bb.write_int32(1);
    bb.write_string("hi").unwrap();
    bb.write_int64(-2);
    let data = bb.data();

    let mut read = ByteBuffer::new(&data);
    assert_eq!(read.read_uint32(), Ok(crate::VECTOR_TAG));
    assert_eq!(read.read_int32(), Ok(1));
    assert_eq!(read.read_string(), Ok(Cow::Borrowed("hi")));
    assert_eq!(read.read_int64(), Ok(-2));
    assert_eq!(read.remaining(), 0);
}
