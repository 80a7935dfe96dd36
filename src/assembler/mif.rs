use super::codegen::MemoryCell;

// A .mif (Memory Initialization File) looks like:
//
//   DEPTH = 32;           -- Size of memory in words
//   WIDTH = 8;            -- Size of word in bits
//   ADDRESS_RADIX = HEX;  -- Radix for address values
//   DATA_RADIX = HEX;     -- Radix for data values
//   CONTENT
//   BEGIN
//
//   00 : 86;    -- LDAA (.main)
//   01 : 05;    -- 5
//   ...
//   [15..1F] : 00;
//
//   END;

/// Number of address bits, in multiples of 4, needed to address `depth`
/// words.
fn addr_bits(depth: u32) -> u32 {
    let significant = 32 - depth.saturating_sub(1).leading_zeros();
    significant.max(1).div_ceil(4) * 4
}

fn hex_addr(addr: u32, digits: usize) -> String {
    format!("{:0width$X}", addr, width = digits)
}

/// Serialize the encoded cells into memory-initialization text.
///
/// `depth` defaults to the occupied size; an explicit override must be
/// at least the occupied size for the program to fit. The remainder of
/// an oversized memory is covered by a single zero-filled range line.
/// Output is deterministic for identical input.
#[tracing::instrument(skip_all)]
pub fn write_image(cells: &[MemoryCell], mem_size: u32, depth_override: Option<u32>) -> String {
    let depth = depth_override.unwrap_or(mem_size);
    let digits = (addr_bits(depth) / 4) as usize;

    let mut out = String::new();
    out.push_str(&format!(
        "DEPTH = {};\t\t\t-- Size of memory in words\n",
        depth
    ));
    out.push_str("WIDTH = 8;\t\t\t\t-- Size of word in bits\n");
    out.push_str("ADDRESS_RADIX = HEX;\t-- Radix for address values\n");
    out.push_str("DATA_RADIX = HEX;\t\t-- Radix for data values\n");
    out.push_str("CONTENT\n");
    out.push_str("BEGIN\n\n");

    for cell in cells {
        out.push_str(&format!(
            "{} : {:02X};",
            hex_addr(cell.addr, digits),
            cell.value
        ));
        if !cell.comment.is_empty() {
            out.push_str(&format!("    -- {}", cell.comment));
        }
        out.push('\n');
    }

    if depth > mem_size {
        out.push_str(&format!(
            "\n[{}..{}] : 00;\n",
            hex_addr(mem_size, digits),
            hex_addr(depth - 1, digits)
        ));
    }
    out.push_str("\nEND;\n");

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn cells() -> Vec<MemoryCell> {
        vec![
            MemoryCell {
                addr: 0,
                value: 0x86,
                comment: "LDAA (.main)".to_string(),
            },
            MemoryCell {
                addr: 1,
                value: 0x05,
                comment: "5".to_string(),
            },
            MemoryCell {
                addr: 2,
                value: 0x39,
                comment: "RTS".to_string(),
            },
        ]
    }

    #[test]
    fn test_addr_bits() {
        assert_eq!(addr_bits(1), 4);
        assert_eq!(addr_bits(16), 4);
        assert_eq!(addr_bits(17), 8);
        assert_eq!(addr_bits(256), 8);
        assert_eq!(addr_bits(257), 12);
        assert_eq!(addr_bits(65536), 16);
    }

    #[test]
    fn test_write_image_without_padding() {
        // Scenario: explicit depth equal to the occupied size emits no
        // padding line.
        let image = write_image(&cells(), 3, Some(3));
        assert_eq!(
            image,
            "DEPTH = 3;\t\t\t-- Size of memory in words\n\
             WIDTH = 8;\t\t\t\t-- Size of word in bits\n\
             ADDRESS_RADIX = HEX;\t-- Radix for address values\n\
             DATA_RADIX = HEX;\t\t-- Radix for data values\n\
             CONTENT\n\
             BEGIN\n\
             \n\
             0 : 86;    -- LDAA (.main)\n\
             1 : 05;    -- 5\n\
             2 : 39;    -- RTS\n\
             \n\
             END;\n"
        );
    }

    #[test]
    fn test_write_image_pads_to_depth() {
        let image = write_image(&cells(), 3, Some(32));
        assert!(image.starts_with("DEPTH = 32;"));
        assert!(image.contains("\n[03..1F] : 00;\n"));
    }

    #[test]
    fn test_address_field_width_follows_depth() {
        let image = write_image(&cells(), 3, Some(257));
        assert!(image.contains("\n000 : 86;"));
        assert!(image.contains("\n[003..100] : 00;\n"));
    }

    #[test]
    fn test_write_image_is_deterministic() {
        assert_eq!(
            write_image(&cells(), 3, Some(32)),
            write_image(&cells(), 3, Some(32))
        );
    }
}
