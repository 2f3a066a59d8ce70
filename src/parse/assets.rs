use nom::{self, le_u16, le_u32, le_u8};

use ::errors::{ErrorKind, Result, nom_to_result};
use ::graphics::{ColorMap, Endoom, Palette, Rgb};

pub const NUM_PALETTES: usize = 14;
pub const NUM_COLORMAPS: usize = 34;
pub const ENDOOM_SIZE: usize = 4000;

/// Bytes of DMX padding around the PCM body, already counted in the header's
/// byte total.
pub const SOUND_PAD_BYTES: u32 = 32;

named!(rgb<Rgb>, do_parse!(
    red: le_u8 >>
    green: le_u8 >>
    blue: le_u8 >>
    (Rgb { red, green, blue })
));

named!(palette<Palette>, map!(count!(rgb, 256), |colors| Palette { colors }));

named!(playpal_lump<Vec<Palette>>, count!(palette, NUM_PALETTES));

named!(colormap<ColorMap>, map!(count!(le_u8, 256), |table| ColorMap { table }));

named!(colormap_lump<Vec<ColorMap>>, count!(colormap, NUM_COLORMAPS));

named!(endoom_lump<Endoom>, map!(take!(ENDOOM_SIZE), |screen: &[u8]| Endoom {
    screen: screen.to_vec(),
}));

pub fn parse_playpal(buf: &[u8]) -> Result<Vec<Palette>> {
    nom_to_result("PLAYPAL", playpal_lump(buf))
}

pub fn parse_colormaps(buf: &[u8]) -> Result<Vec<ColorMap>> {
    nom_to_result("COLORMAP", colormap_lump(buf))
}

pub fn parse_endoom(buf: &[u8]) -> Result<Endoom> {
    nom_to_result("ENDOOM", endoom_lump(buf))
}

/// DMX sound header.  Format 3 is the only supported format; the 16 pad
/// bytes before the PCM body are consumed with the header.
#[derive(Debug, Eq, PartialEq)]
pub struct SoundHeader {
    pub format: u16,
    pub sample_rate: u16,
    pub num_bytes: u32,
}

named!(sound_header<SoundHeader>, do_parse!(
    format: le_u16 >>
    sample_rate: le_u16 >>
    num_bytes: le_u32 >>
    take!(16) >>
    (SoundHeader { format, sample_rate, num_bytes })
));

/// Parses a sound lump's header and returns it along with the bytes that
/// follow it (the PCM body plus trailing padding).
pub fn parse_sound_header(buf: &[u8]) -> Result<(SoundHeader, &[u8])> {
    match sound_header(buf) {
        Ok((body, header)) => Ok((header, body)),
        Err(nom::Err::Incomplete(_)) => {
            Err(ErrorKind::TruncatedLump("sound header".to_owned()).into())
        }
        Err(_) => Err(ErrorKind::BadLump("sound", "unparseable header".to_owned()).into()),
    }
}

/// MUS music header: magic, score geometry, channel counts, and the
/// instrument list.  The event stream after the header is not decoded.
#[derive(Debug, Eq, PartialEq)]
pub struct MusicHeader {
    pub score_len: u16,
    pub score_start: u16,
    pub primary_channels: u16,
    pub secondary_channels: u16,
    pub instruments: Vec<u16>,
}

named!(music_header<MusicHeader>, do_parse!(
    tag!(b"MUS\x1a") >>
    score_len: le_u16 >>
    score_start: le_u16 >>
    primary_channels: le_u16 >>
    secondary_channels: le_u16 >>
    instrument_count: le_u16 >>
    take!(2) >>
    instruments: count!(le_u16, instrument_count as usize) >>
    (MusicHeader {
        score_len,
        score_start,
        primary_channels,
        secondary_channels,
        instruments,
    })
));

pub fn parse_music_header(buf: &[u8]) -> Result<MusicHeader> {
    nom_to_result("music header", music_header(buf))
}

#[cfg(test)]
mod tests {
    use byteorder::{LittleEndian, WriteBytesExt};

    use super::{
        parse_music_header, parse_playpal, parse_sound_header, ENDOOM_SIZE, NUM_COLORMAPS,
        NUM_PALETTES,
    };
    use ::graphics::Rgb;

    #[test]
    fn parses_all_fourteen_palettes() {
        let mut buf = Vec::new();
        for palette in 0..NUM_PALETTES {
            for color in 0..256 {
                buf.push(palette as u8);
                buf.push(color as u8);
                buf.push(0);
            }
        }

        let palettes = parse_playpal(&buf).unwrap();
        assert_eq!(palettes.len(), NUM_PALETTES);
        assert_eq!(palettes[0].colors.len(), 256);
        assert_eq!(
            palettes[13].colors[7],
            Rgb {
                red: 13,
                green: 7,
                blue: 0
            }
        );
    }

    #[test]
    fn rejects_a_short_playpal() {
        let buf = vec![0; NUM_PALETTES * 768 - 1];
        assert!(parse_playpal(&buf).is_err());
    }

    #[test]
    fn parses_colormaps_and_endoom() {
        let buf = vec![5; NUM_COLORMAPS * 256];
        let colormaps = super::parse_colormaps(&buf).unwrap();
        assert_eq!(colormaps.len(), NUM_COLORMAPS);
        assert_eq!(colormaps[33].table[255], 5);

        let buf = vec![7; ENDOOM_SIZE];
        let endoom = super::parse_endoom(&buf).unwrap();
        assert_eq!(endoom.screen.len(), ENDOOM_SIZE);
    }

    #[test]
    fn parses_a_sound_header_and_returns_the_body() {
        let mut buf = Vec::new();
        buf.write_u16::<LittleEndian>(3).unwrap();
        buf.write_u16::<LittleEndian>(11025).unwrap();
        buf.write_u32::<LittleEndian>(4 + 32).unwrap();
        buf.extend_from_slice(&[0; 16]);
        buf.extend_from_slice(&[10, 20, 30, 40]);

        let (header, body) = parse_sound_header(&buf).unwrap();
        assert_eq!(header.format, 3);
        assert_eq!(header.sample_rate, 11025);
        assert_eq!(header.num_bytes, 36);
        assert_eq!(body, &[10, 20, 30, 40]);
    }

    #[test]
    fn parses_a_music_header() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"MUS\x1a");
        for &word in &[100u16, 20, 5, 0, 2, 0] {
            buf.write_u16::<LittleEndian>(word).unwrap();
        }
        buf.write_u16::<LittleEndian>(1).unwrap();
        buf.write_u16::<LittleEndian>(35).unwrap();

        let header = parse_music_header(&buf).unwrap();
        assert_eq!(header.score_len, 100);
        assert_eq!(header.score_start, 20);
        assert_eq!(header.instruments, vec![1, 35]);
    }

    #[test]
    fn rejects_music_without_the_mus_magic() {
        assert!(parse_music_header(b"MID\x1a\0\0\0\0\0\0\0\0\0\0\0\0").is_err());
    }
}
