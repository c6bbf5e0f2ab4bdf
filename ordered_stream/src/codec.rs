//! Stream adapters that apply a codec to bytes as they pass through.
//!
//! The pipeline never looks at the compressed format. On compress the
//! destination is wrapped in an [`EncodedWriter`]; on decompress the source is
//! wrapped in a [`DecodedReader`]. Both are plain `Write`/`Read` streams.

use std::fmt;
use std::io::{self, BufReader, Read, Write};
use std::ops::RangeInclusive;
use std::str::FromStr;

use bzip2::read::MultiBzDecoder;
use bzip2::write::BzEncoder;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;

/// Compression format applied to the whole stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Codec {
    #[default]
    Gzip,
    Bzip2,
    Zstd,
}

impl Codec {
    pub const ALL: [Codec; 3] = [Codec::Gzip, Codec::Bzip2, Codec::Zstd];

    pub fn name(self) -> &'static str {
        match self {
            Codec::Gzip => "gzip",
            Codec::Bzip2 => "bzip2",
            Codec::Zstd => "zstd",
        }
    }

    /// Suffix appended to archive names that lack a recognized one.
    pub fn suffix(self) -> &'static str {
        match self {
            Codec::Gzip => ".gz",
            Codec::Bzip2 => ".bz2",
            Codec::Zstd => ".zst",
        }
    }

    pub fn default_level(self) -> u32 {
        match self {
            Codec::Gzip => 6,
            Codec::Bzip2 => 6,
            Codec::Zstd => 3,
        }
    }

    pub fn level_range(self) -> RangeInclusive<u32> {
        match self {
            Codec::Gzip => 0..=9,
            Codec::Bzip2 => 1..=9,
            Codec::Zstd => 1..=22,
        }
    }

    /// Resolves an optional user level to one the codec accepts.
    pub fn effective_level(self, level: Option<u32>) -> u32 {
        let range = self.level_range();
        level
            .unwrap_or_else(|| self.default_level())
            .clamp(*range.start(), *range.end())
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Codec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Codec::ALL
            .into_iter()
            .find(|codec| codec.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown codec '{s}' (expected gzip, bzip2 or zstd)"))
    }
}

enum Encoder<W: Write> {
    Gzip(GzEncoder<W>),
    Bzip2(BzEncoder<W>),
    Zstd(zstd::stream::write::Encoder<'static, W>),
}

/// Destination stream that compresses everything written to it.
///
/// [`finish`](EncodedWriter::finish) must be called once writing is complete
/// so the codec trailer reaches the underlying writer.
pub struct EncodedWriter<W: Write>(Encoder<W>);

impl<W: Write> EncodedWriter<W> {
    pub fn new(codec: Codec, writer: W, level: Option<u32>) -> io::Result<Self> {
        let level = codec.effective_level(level);
        let encoder = match codec {
            Codec::Gzip => Encoder::Gzip(GzEncoder::new(writer, flate2::Compression::new(level))),
            Codec::Bzip2 => Encoder::Bzip2(BzEncoder::new(writer, bzip2::Compression::new(level))),
            Codec::Zstd => {
                let mut zstd_out = zstd::stream::write::Encoder::new(writer, level as i32)?;
                zstd_out.include_checksum(true)?;
                Encoder::Zstd(zstd_out)
            }
        };
        Ok(EncodedWriter(encoder))
    }

    /// Writes the codec trailer and returns the underlying writer, flushed.
    pub fn finish(self) -> io::Result<W> {
        let mut writer = match self.0 {
            Encoder::Gzip(encoder) => encoder.finish()?,
            Encoder::Bzip2(encoder) => encoder.finish()?,
            Encoder::Zstd(encoder) => encoder.finish()?,
        };
        writer.flush()?;
        Ok(writer)
    }
}

impl<W: Write> Write for EncodedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.0 {
            Encoder::Gzip(encoder) => encoder.write(buf),
            Encoder::Bzip2(encoder) => encoder.write(buf),
            Encoder::Zstd(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.0 {
            Encoder::Gzip(encoder) => encoder.flush(),
            Encoder::Bzip2(encoder) => encoder.flush(),
            Encoder::Zstd(encoder) => encoder.flush(),
        }
    }
}

enum Decoder<R: Read> {
    Gzip(MultiGzDecoder<R>),
    Bzip2(MultiBzDecoder<R>),
    Zstd(zstd::stream::read::Decoder<'static, BufReader<R>>),
}

/// Source stream that yields the decompressed bytes of its input.
///
/// Concatenated members (several gzip members, bzip2 streams or zstd frames)
/// decode as one stream.
pub struct DecodedReader<R: Read>(Decoder<R>);

impl<R: Read> DecodedReader<R> {
    pub fn new(codec: Codec, reader: R) -> io::Result<Self> {
        let decoder = match codec {
            Codec::Gzip => Decoder::Gzip(MultiGzDecoder::new(reader)),
            Codec::Bzip2 => Decoder::Bzip2(MultiBzDecoder::new(reader)),
            Codec::Zstd => Decoder::Zstd(zstd::stream::read::Decoder::new(reader)?),
        };
        Ok(DecodedReader(decoder))
    }
}

impl<R: Read> Read for DecodedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.0 {
            Decoder::Gzip(decoder) => decoder.read(buf),
            Decoder::Bzip2(decoder) => decoder.read(buf),
            Decoder::Zstd(decoder) => decoder.read(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        (0..50_000u32).flat_map(|i| (i % 97).to_le_bytes()).collect()
    }

    fn encode(codec: Codec, data: &[u8]) -> Vec<u8> {
        let mut writer = EncodedWriter::new(codec, Vec::new(), None).unwrap();
        writer.write_all(data).unwrap();
        writer.finish().unwrap()
    }

    fn decode(codec: Codec, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        DecodedReader::new(codec, data)?.read_to_end(&mut out)?;
        Ok(out)
    }

    #[test]
    fn test_every_codec_restores_input() {
        let data = sample();
        for codec in Codec::ALL {
            let encoded = encode(codec, &data);
            assert!(encoded.len() < data.len(), "{codec} did not compress");
            assert_eq!(decode(codec, &encoded).unwrap(), data, "{codec}");
        }
    }

    #[test]
    fn test_gzip_output_has_gzip_magic() {
        let encoded = encode(Codec::Gzip, b"hello");
        assert_eq!(&encoded[..2], &[0x1f, 0x8b]);
    }

    #[test]
    fn test_concatenated_members_decode_as_one_stream() {
        for codec in Codec::ALL {
            let mut joined = encode(codec, b"first ");
            joined.extend(encode(codec, b"second"));
            assert_eq!(decode(codec, &joined).unwrap(), b"first second", "{codec}");
        }
    }

    #[test]
    fn test_garbage_input_is_an_error() {
        let garbage = b"definitely not compressed data";
        for codec in Codec::ALL {
            assert!(decode(codec, garbage).is_err(), "{codec}");
        }
    }

    #[test]
    fn test_levels_are_clamped() {
        assert_eq!(Codec::Gzip.effective_level(None), 6);
        assert_eq!(Codec::Gzip.effective_level(Some(42)), 9);
        assert_eq!(Codec::Bzip2.effective_level(Some(0)), 1);
        assert_eq!(Codec::Zstd.effective_level(Some(19)), 19);
    }

    #[test]
    fn test_parse_codec_names() {
        assert_eq!("gzip".parse::<Codec>().unwrap(), Codec::Gzip);
        assert_eq!("ZSTD".parse::<Codec>().unwrap(), Codec::Zstd);
        assert!("lzma".parse::<Codec>().is_err());
    }
}
