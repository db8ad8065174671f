use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Chain, Cursor, Read};
use std::path::Path;

type ChainReader = Chain<Cursor<Vec<u8>>, File>;
type GzipReader = BufReader<MultiGzDecoder<ChainReader>>;
type ZstdReader = BufReader<zstd::Decoder<'static, BufReader<ChainReader>>>;
type PlainReader = BufReader<ChainReader>;

/// Streaming decompression wrapper that implements BufRead
/// Detects gzip (1F 8B 08) and zstd (28 B5 2F FD) compression using magic bytes
pub enum DecompressionReader {
    Gzip(GzipReader),
    Zstd(ZstdReader),
    /// Passthrough for non-compressed files
    Plain(PlainReader),
}

// zstd::Decoder doesn't implement Debug
impl std::fmt::Debug for DecompressionReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

impl BufRead for DecompressionReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            DecompressionReader::Gzip(reader) => reader.fill_buf(),
            DecompressionReader::Zstd(reader) => reader.fill_buf(),
            DecompressionReader::Plain(reader) => reader.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            DecompressionReader::Gzip(reader) => reader.consume(amt),
            DecompressionReader::Zstd(reader) => reader.consume(amt),
            DecompressionReader::Plain(reader) => reader.consume(amt),
        }
    }
}

impl Read for DecompressionReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            DecompressionReader::Gzip(reader) => reader.read(buf),
            DecompressionReader::Zstd(reader) => reader.read(buf),
            DecompressionReader::Plain(reader) => reader.read(buf),
        }
    }
}

/// Detect compression format by magic bytes and return appropriate reader
fn detect_compression_file(mut file: File) -> io::Result<DecompressionReader> {
    let mut head = [0u8; 4];
    let n = read_head(&mut file, &mut head)?;

    // Put the read bytes back in front using a cursor chain
    let prefix = Cursor::new(head[..n].to_vec());
    let chained = prefix.chain(file);

    let is_gzip = n >= 3 && head[0] == 0x1F && head[1] == 0x8B && head[2] == 0x08;
    let is_zstd = n >= 4 && head == [0x28, 0xB5, 0x2F, 0xFD];

    if is_gzip {
        let decoder = MultiGzDecoder::new(chained);
        Ok(DecompressionReader::Gzip(BufReader::new(decoder)))
    } else if is_zstd {
        let decoder = zstd::Decoder::new(chained)?;
        Ok(DecompressionReader::Zstd(BufReader::new(decoder)))
    } else {
        Ok(DecompressionReader::Plain(BufReader::new(chained)))
    }
}

/// Fill `head` as far as the file allows; short files yield fewer bytes
fn read_head(file: &mut File, head: &mut [u8; 4]) -> io::Result<usize> {
    let mut n = 0;
    while n < head.len() {
        match file.read(&mut head[n..]) {
            Ok(0) => break,
            Ok(read) => n += read,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(n)
}

impl DecompressionReader {
    /// Open a file with compression auto-detected from its magic bytes
    pub fn new<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path_ref = path.as_ref();

        if let Some(extension) = path_ref.extension().and_then(|ext| ext.to_str()) {
            if extension.eq_ignore_ascii_case("zip") {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "ZIP archives are not supported, only gzip, zstd and plain files",
                ));
            }
        }

        let file = File::open(path_ref)?;
        detect_compression_file(file)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DecompressionReader::Gzip(_) => "gzip",
            DecompressionReader::Zstd(_) => "zstd",
            DecompressionReader::Plain(_) => "plain",
        }
    }
}
