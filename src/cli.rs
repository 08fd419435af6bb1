use clap::Parser;

use crate::codec::Endian;

#[derive(Parser, Debug)]
#[command(name = "seekio")]
#[command(version)]
#[command(about = "Inspect files, archives and URLs through random-access reads", long_about = None)]
#[command(after_help = "Examples:\n  \
  seekio -i image.tif.gz                 show the store kind and decoded length\n  \
  seekio -o 0x100 -n 64 data.bin.bz2     dump 64 bytes at offset 0x100\n  \
  seekio -L --u32 4 -o 4 image.tif       read four little-endian u32 values\n  \
  seekio -f '\\n' https://example.com/a  print the first line of a remote file\n  \
  seekio -l bundle.zip                   list the members of a zip archive")]
pub struct Cli {
    /// File path, archive or HTTP URL
    #[arg(value_name = "ID")]
    pub id: String,

    /// Show the store kind and length
    #[arg(short = 'i', long)]
    pub info: bool,

    /// List zip members instead of reading
    #[arg(short = 'l')]
    pub list: bool,

    /// Zip member to read (default: the one named like the archive)
    #[arg(short = 'e', long, value_name = "NAME")]
    pub entry: Option<String>,

    /// Offset to start reading at (decimal or 0x hex)
    #[arg(short = 'o', long, default_value = "0", value_parser = parse_offset)]
    pub offset: u64,

    /// Bytes to dump
    #[arg(short = 'n', long, default_value_t = 256)]
    pub count: u64,

    /// Decode values as little-endian
    #[arg(short = 'L', long)]
    pub little: bool,

    /// Read this many unsigned 16-bit values
    #[arg(long, value_name = "N", conflicts_with_all = ["u32", "find"])]
    pub u16: Option<usize>,

    /// Read this many unsigned 32-bit values
    #[arg(long, value_name = "N", conflicts_with = "find")]
    pub u32: Option<usize>,

    /// Print text up to and including a terminator (\n, \r, \t, \0 escapes allowed)
    #[arg(short = 'f', long, value_name = "TERMINATOR")]
    pub find: Option<String>,

    /// Quiet mode
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        crate::location::is_url(&self.id)
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn order(&self) -> Endian {
        Endian::from_little(self.little)
    }

    pub fn terminator(&self) -> Option<String> {
        self.find.as_deref().map(unescape)
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal offset.
pub fn parse_offset(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid offset {s:?}: {e}"))
}

/// Expand `\n`, `\r`, `\t`, `\0` and `\\`.
pub fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// One line of a hex dump: offset, up to 16 bytes, and their printable form.
pub fn hex_row(offset: u64, bytes: &[u8]) -> String {
    let mut hex = String::with_capacity(48);
    for (i, b) in bytes.iter().enumerate() {
        if i == 8 {
            hex.push(' ');
        }
        hex.push_str(&format!("{b:02x} "));
    }
    let ascii: String = bytes
        .iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
        .collect();
    format!("{offset:08x}  {hex:<49} |{ascii}|")
}

/// Format a byte size into a human-readable string.
pub fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_accept_hex() {
        assert_eq!(parse_offset("0x100"), Ok(256));
        assert_eq!(parse_offset("42"), Ok(42));
        assert!(parse_offset("0xzz").is_err());
    }

    #[test]
    fn escapes_expand() {
        assert_eq!(unescape(r"a\nb\0\\"), "a\nb\0\\");
    }

    #[test]
    fn hex_rows_pad_short_lines() {
        let full = hex_row(0, b"0123456789abcdef");
        let short = hex_row(16, b"AB\n");
        assert_eq!(full.find('|'), short.find('|'));
        assert!(short.starts_with("00000010  41 42 0a "));
        assert!(short.ends_with("|AB.|"));
    }

    #[test]
    fn sizes_pick_a_unit() {
        assert_eq!(format_size(500), "500 bytes");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
    }

    #[test]
    fn cli_parses() {
        let cli = Cli::parse_from(["seekio", "-L", "--u32", "2", "-o", "0x10", "a.bin"]);
        assert_eq!(cli.offset, 16);
        assert_eq!(cli.u32, Some(2));
        assert_eq!(cli.order(), Endian::Little);
    }
}
