use crate::protocol::PAGE_SIZE;

/// Formats bytes as uppercase hexadecimal pairs separated by spaces.
pub(crate) fn format_hex(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "<empty>".to_string();
    }

    let mut rendered = String::with_capacity(bytes.len().saturating_mul(3));
    for (index, value) in bytes.iter().enumerate() {
        if index > 0 {
            rendered.push(' ');
        }
        let high = value >> 4;
        let low = value & 0x0F;
        rendered.push(nibble_to_hex(high));
        rendered.push(nibble_to_hex(low));
    }
    rendered
}

/// Formats bytes as a page dump, one `[PP] B0 B1 B2 B3` line per page.
pub(crate) fn format_pages(start_page: u8, bytes: &[u8]) -> String {
    bytes
        .chunks(PAGE_SIZE)
        .enumerate()
        .map(|(index, chunk)| {
            let page = usize::from(start_page) + index;
            format!("[{page:02X}] {}", format_hex(chunk))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn nibble_to_hex(value: u8) -> char {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    HEX[value as usize] as char
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn format_hex_handles_empty_payload() {
        assert_eq!("<empty>", format_hex(&[]));
    }

    #[test]
    fn format_hex_formats_uppercase_pairs() {
        assert_eq!("05 00 A1 FF", format_hex(&[0x05, 0x00, 0xA1, 0xFF]));
    }

    #[test]
    fn format_pages_numbers_each_page() {
        assert_eq!(
            "[0E] 00 01 02 03\n[0F] 53 50 4C 7A",
            format_pages(0x0E, &[0, 1, 2, 3, 0x53, 0x50, 0x4C, 0x7A])
        );
    }
}
