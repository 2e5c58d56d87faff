//! Raw screenshot bytes as produced by a browser driver, before
//! validation or persistence.

#[derive(Debug, Clone)]
pub struct RawCapture {
    pub png_bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}
