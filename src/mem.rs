//! MEM image emission: formats a byte image into `@address word` text
//! records, little-endian within each word, with optional zlib compression
//! of the image first. Targeted at serving an EDS over SDO from a small
//! memory, but works for any byte stream.

use std::io;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

/// Deflates `data` at the given level (1-9) inside a zlib wrapper.
pub fn compress(data: &[u8], level: u32) -> io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(data)?;
    encoder.finish()
}

/// Hex digits needed for the line addresses of a `len`-byte image.
fn address_width(len: usize) -> usize {
    if len <= 1 {
        return 1;
    }
    let bits = u64::BITS - ((len - 1) as u64).leading_zeros();
    ((bits as usize) + 3) / 4
}

/// Renders the image as MEM text: `// ` header lines, then one
/// `@<hex-address> <hex-word>` record per `word` bytes, addresses counting
/// words, bytes reversed within the word so byte 0 is least significant.
pub fn render(data: &[u8], word: usize, invocation: &str) -> String {
    let word = word.max(1);
    let width = address_width(data.len());
    let mut out = String::with_capacity(data.len() * 3 + 128);
    out.push_str(&format!("// Generated with {}\n", invocation));
    out.push_str(&format!("// {} bytes valid\n", data.len()));
    for (line, chunk_start) in (0..data.len()).step_by(word).enumerate() {
        out.push_str(&format!("@{:0width$X} ", line, width = width));
        for j in (0..word).rev() {
            let b = data.get(chunk_start + j).copied().unwrap_or(0);
            out.push_str(&format!("{:02X}", b));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{address_width, compress, render};

    #[test]
    fn test_address_width() {
        assert_eq!(address_width(0), 1);
        assert_eq!(address_width(1), 1);
        assert_eq!(address_width(16), 1);
        assert_eq!(address_width(17), 2);
        assert_eq!(address_width(256), 2);
        assert_eq!(address_width(257), 3);
    }

    #[test]
    fn test_render_packs_little_endian() {
        let text = render(&[0x01, 0x02, 0x03, 0x04, 0x05], 4, "eds2mem");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "// Generated with eds2mem");
        assert_eq!(lines[1], "// 5 bytes valid");
        assert_eq!(lines[2], "@0 04030201");
        assert_eq!(lines[3], "@1 00000005");
    }

    #[test]
    fn test_render_default_word() {
        let data: Vec<u8> = (0u8..14).collect();
        let text = render(&data, 7, "eds2mem");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[2], "@0 06050403020100");
        assert_eq!(lines[3], "@1 0D0C0B0A090807");
    }

    #[test]
    fn test_compress_is_zlib() {
        let data = vec![0u8; 256];
        let compressed = compress(&data, 6).unwrap();
        assert!(compressed.len() < data.len());
        // zlib header: CMF 0x78 for 32K window deflate
        assert_eq!(compressed[0], 0x78);
    }

    #[test]
    fn test_determinism() {
        let data: Vec<u8> = (0u8..100).collect();
        assert_eq!(render(&data, 7, "x"), render(&data, 7, "x"));
        assert_eq!(compress(&data, 9).unwrap(), compress(&data, 9).unwrap());
    }
}
