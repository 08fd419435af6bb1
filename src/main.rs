//! Main entry point for the seekio CLI.
//!
//! Opens a file, archive member or URL through the random-access layer and
//! prints what is found at a given offset.

use anyhow::{Context as _, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;

use seekio::cli::{format_size, hex_row};
use seekio::io::{LocalFileReader, Origin, UrlSource};
use seekio::{Cli, RandomAccess, RandomAccessReader, StreamHandle, ZipParser};

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.list {
        return list_entries(&cli);
    }

    let (mut reader, source) = open(&cli)?;
    reader.set_order(cli.order());

    if cli.info {
        println!(
            "{}: {:?}, {} ({} bytes)",
            cli.id,
            reader.kind(),
            format_size(reader.length()),
            reader.length()
        );
    }

    reader.seek(cli.offset)?;
    if let Some(terminator) = cli.terminator() {
        let text = reader.find_string(&[terminator.as_str()])?;
        print!("{text}");
    } else if let Some(n) = cli.u16 {
        for _ in 0..n {
            let at = reader.position();
            let v = reader.read_u16()?;
            println!("{at:08x}  {v:#06x}  {v}");
        }
    } else if let Some(n) = cli.u32 {
        for _ in 0..n {
            let at = reader.position();
            let v = reader.read_u32()?;
            println!("{at:08x}  {v:#010x}  {v}");
        }
    } else if !cli.info {
        hex_dump(&mut reader, cli.count)?;
    }

    if let Some(source) = source {
        if !cli.is_quiet() {
            eprintln!("\nTotal bytes transferred: {}", format_size(source.transferred_bytes()));
        }
    }
    Ok(())
}

/// Open the reader the arguments name, keeping the URL source for statistics.
fn open(cli: &Cli) -> Result<(RandomAccessReader, Option<Arc<UrlSource>>)> {
    if cli.is_http_url() {
        let origin = Origin::url(&cli.id)?;
        let source = match &origin {
            Origin::Url(source) => Some(Arc::clone(source)),
            _ => None,
        };
        let reader = RandomAccessReader::from_handle(StreamHandle::new(origin)?)?;
        return Ok((reader, source));
    }
    if let Some(entry) = &cli.entry {
        let handle = StreamHandle::zip_entry(&cli.id, entry)
            .with_context(|| format!("opening {} in {}", entry, cli.id))?;
        return Ok((RandomAccessReader::from_handle(handle)?, None));
    }
    let reader = RandomAccessReader::open(&cli.id).with_context(|| format!("opening {}", cli.id))?;
    Ok((reader, None))
}

fn list_entries(cli: &Cli) -> Result<()> {
    let parser = ZipParser::new(LocalFileReader::new(Path::new(&cli.id))?);
    let entries = parser.list_files()?;

    if !cli.is_quiet() {
        println!("  Length      Name");
        println!("---------  ----------");
    }
    let mut total = 0;
    for entry in entries.iter().filter(|e| !e.is_directory) {
        println!("{:>9}  {}", entry.uncompressed_size, entry.file_name);
        total += entry.uncompressed_size;
    }
    if !cli.is_quiet() {
        println!("---------  ----------");
        println!("{total:>9}  {} files", entries.iter().filter(|e| !e.is_directory).count());
    }
    Ok(())
}

fn hex_dump(reader: &mut RandomAccessReader, count: u64) -> Result<()> {
    let mut remaining = count.min(reader.length().saturating_sub(reader.position()));
    let mut row = [0u8; 16];
    while remaining > 0 {
        let at = reader.position();
        let n = remaining.min(16) as usize;
        reader.read_fully(&mut row[..n])?;
        println!("{}", hex_row(at, &row[..n]));
        remaining -= n as u64;
    }
    Ok(())
}
