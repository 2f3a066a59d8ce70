use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::rc::Rc;

use ::errors::{ErrorKind, Result, nom_to_result};
use ::geom::Point;
use ::graphics::{
    composite_picture, ColorMap, Demo, Dmxgus, Endoom, Flat, MusicScore, Palette, Patch, Picture,
    Sound, Sprite, SpriteFrame, Texture, FLAT_HEIGHT, FLAT_WIDTH, TRANSPARENT_INDEX,
};
use ::input_buffer::InputBuffer;
use ::map::{BlockMap, Level, Line, Node, Reject, Sector, Segment, Side, Subsector, Thing};
use ::parse::assets::{
    parse_colormaps, parse_endoom, parse_music_header, parse_playpal, parse_sound_header,
    SOUND_PAD_BYTES,
};
use ::parse::map::{
    linedefs_lump, nodes_lump, parse_blockmap, sectors_lump, segs_lump, sidedefs_lump,
    ssectors_lump, things_lump, vertexes_lump,
};
use ::parse::picture::parse_picture;
use ::parse::texturex::{parse_pnames, parse_texturex};
use ::parse::wad::{parse_directory, parse_header};

#[derive(Clone, Copy, Debug)]
pub struct Header {
    pub num_lumps: usize,
    pub info_table_ofs: usize,
}

#[derive(Clone, Debug)]
pub struct LumpInfo {
    pub name: String,
    pub filepos: usize,
    pub size: usize,
}

/// A Doom data archive: the lump directory plus every non-level asset,
/// eagerly decoded on open.  Levels are decoded on demand with
/// `read_level`.
///
/// The archive owns the byte source and the picture cache, so decoding is
/// strictly single-owner; already-decoded assets can be read freely.
pub struct Archive {
    input: InputBuffer,
    pub header: Header,
    lump_infos: Vec<LumpInfo>,
    /// Name to last directory index with that name.
    lump_index: HashMap<String, usize>,
    /// Level name to the index of its name marker lump.
    level_index: BTreeMap<String, usize>,

    pub palettes: Vec<Palette>,
    pub colormaps: Vec<ColorMap>,
    pub endoom: Endoom,
    pub demos: Vec<Demo>,
    pub dmxgus: Dmxgus,
    patch_names: Vec<String>,
    pictures: HashMap<String, Rc<Picture>>,
    pub textures: HashMap<String, Rc<Texture>>,
    pub textures_list: Vec<Rc<Texture>>,
    pub flats: HashMap<String, Rc<Flat>>,
    pub flats_list: Vec<Rc<Flat>>,
    pub sprites: HashMap<String, Sprite>,
    pub sounds: HashMap<String, Sound>,
    pub scores: HashMap<String, MusicScore>,
    pub transparent_index: u8,
}

impl Archive {
    /// Opens an IWAD file and decodes every non-level asset.  The decode
    /// order matters: pictures need the directory, textures need PNAMES and
    /// the picture cache, sprites need the picture cache.
    pub fn open<P>(path: P) -> Result<Archive>
    where
        P: AsRef<Path>,
    {
        info!("reading WAD archive");
        let input = InputBuffer::open(path)?;
        let (header, lump_infos) = {
            let bytes = input.bytes();
            let bare = parse_header(bytes)?;
            let entries = parse_directory(bytes, &bare)?;
            let infos = entries
                .into_iter()
                .map(|entry| LumpInfo {
                    name: entry.name,
                    filepos: entry.filepos as usize,
                    size: entry.size as usize,
                })
                .collect::<Vec<_>>();
            (
                Header {
                    num_lumps: bare.num_lumps as usize,
                    info_table_ofs: bare.info_table_ofs as usize,
                },
                infos,
            )
        };

        let mut lump_index = HashMap::with_capacity(lump_infos.len());
        let mut level_index = BTreeMap::new();
        for (i, info) in lump_infos.iter().enumerate() {
            // The lump right before THINGS names the level.
            if info.name == "THINGS" && i > 0 {
                level_index.insert(lump_infos[i - 1].name.clone(), i - 1);
            }
            // Duplicate names resolve to the last occurrence.
            lump_index.insert(info.name.clone(), i);
        }

        let mut archive = Archive {
            input,
            header,
            lump_infos,
            lump_index,
            level_index,
            palettes: Vec::new(),
            colormaps: Vec::new(),
            endoom: Endoom { screen: Vec::new() },
            demos: Vec::new(),
            dmxgus: Dmxgus,
            patch_names: Vec::new(),
            pictures: HashMap::new(),
            textures: HashMap::new(),
            textures_list: Vec::new(),
            flats: HashMap::new(),
            flats_list: Vec::new(),
            sprites: HashMap::new(),
            sounds: HashMap::new(),
            scores: HashMap::new(),
            transparent_index: TRANSPARENT_INDEX,
        };

        archive.palettes = archive.read_playpal()?;
        archive.colormaps = archive.read_colormaps()?;
        archive.endoom = archive.read_endoom()?;
        archive.demos = archive.read_demos()?;
        archive.dmxgus = archive.read_dmxgus()?;
        archive.patch_names = archive.read_patch_names()?;
        archive.read_patch_pics();
        archive.read_textures()?;
        archive.read_flats()?;
        archive.read_sprites()?;
        archive.read_sounds()?;
        archive.read_music()?;

        Ok(archive)
    }

    /// The directory, in archive order.
    pub fn lumps(&self) -> &[LumpInfo] {
        &self.lump_infos
    }

    /// Directory index of the last lump with this name.
    pub fn lump_num(&self, name: &str) -> Option<usize> {
        self.lump_index.get(&name.to_ascii_uppercase()).cloned()
    }

    /// The raw bytes of lump `num`, exactly as long as the directory says.
    pub fn read_lump(&self, num: usize) -> Result<&[u8]> {
        let info = match self.lump_infos.get(num) {
            Some(info) => info,
            None => bail!(ErrorKind::LumpNotFound(format!("lump #{}", num))),
        };
        self.input.slice(info.filepos, info.size)
    }

    pub fn read_lump_by_name(&self, name: &str) -> Result<&[u8]> {
        let num = self.lump_num_or_err(name)?;
        self.read_lump(num)
    }

    fn lump_num_or_err(&self, name: &str) -> Result<usize> {
        match self.lump_index.get(name) {
            Some(&num) => Ok(num),
            None => bail!(ErrorKind::LumpNotFound(name.to_owned())),
        }
    }

    fn read_playpal(&self) -> Result<Vec<Palette>> {
        debug!("loading PLAYPAL ...");
        let buf = self.read_lump_by_name("PLAYPAL")?;
        parse_playpal(buf)
    }

    fn read_colormaps(&self) -> Result<Vec<ColorMap>> {
        debug!("loading COLORMAP ...");
        let buf = self.read_lump_by_name("COLORMAP")?;
        parse_colormaps(buf)
    }

    fn read_endoom(&self) -> Result<Endoom> {
        debug!("loading ENDOOM ...");
        let buf = self.read_lump_by_name("ENDOOM")?;
        parse_endoom(buf)
    }

    /// Demo lumps are recognized but not interpreted.
    fn read_demos(&self) -> Result<Vec<Demo>> {
        Ok(Vec::new())
    }

    /// DMXGUS is recognized but not interpreted.
    fn read_dmxgus(&self) -> Result<Dmxgus> {
        Ok(Dmxgus)
    }

    fn read_patch_names(&self) -> Result<Vec<String>> {
        debug!("loading patch names ...");
        let buf = self.read_lump_by_name("PNAMES")?;
        parse_pnames(buf)
    }

    /// Warms the picture cache with every patch PNAMES lists.  A missing
    /// patch lump is not fatal; textures built on it hold a null picture.
    fn read_patch_pics(&mut self) {
        debug!("loading patch pictures ...");
        let names = self.patch_names.clone();
        for name in names {
            if let Err(err) = self.get_picture(&name) {
                warn!("missing patch picture {}: {}", name, err);
            }
        }
        info!("loaded {} patch pictures", self.pictures.len());
    }

    fn read_textures(&mut self) -> Result<()> {
        debug!("loading textures ...");
        for i in 1..10 {
            let name = format!("TEXTURE{}", i);
            let num = match self.lump_index.get(&name) {
                Some(&num) => num,
                None => continue,
            };
            debug!("loading {} ...", name);
            let bares = {
                let buf = self.read_lump(num)?;
                parse_texturex(buf)?
            };
            for bare in bares {
                if bare.width < 0 || bare.height < 0 {
                    bail!(ErrorKind::BadLump(
                        "TEXTUREx",
                        format!(
                            "texture {} has negative dimensions {}x{}",
                            bare.name, bare.width, bare.height
                        )
                    ));
                }
                let width = bare.width as usize;
                let height = bare.height as usize;

                let mut patches = Vec::with_capacity(bare.patches.len());
                for patch in &bare.patches {
                    let idx = patch.patch_name_idx;
                    if idx < 0 || idx as usize >= self.patch_names.len() {
                        bail!(ErrorKind::BadLump(
                            "TEXTUREx",
                            format!("texture {} references patch name {}", bare.name, idx)
                        ));
                    }
                    patches.push(Patch {
                        x_offset: patch.x_offset as i32,
                        y_offset: patch.y_offset as i32,
                        picture: self.pictures.get(&self.patch_names[idx as usize]).cloned(),
                    });
                }

                let picture = composite_picture(&bare.name, width, height, &patches);
                let texture = Rc::new(Texture {
                    name: bare.name.clone(),
                    index: self.textures_list.len(),
                    is_masked: bare.masked != 0,
                    width,
                    height,
                    patches,
                    picture: Rc::new(picture),
                });
                self.textures.insert(bare.name, texture.clone());
                self.textures_list.push(texture);
            }
        }
        info!("loaded {} textures", self.textures.len());
        Ok(())
    }

    fn read_flats(&mut self) -> Result<()> {
        debug!("loading flats ...");
        let start = self.lump_num_or_err("F_START")?;
        let end = self.lump_num_or_err("F_END")?;
        for num in start + 1..end {
            let info = self.lump_infos[num].clone();
            // Zero-sized entries between the markers are nested markers
            // (F1_START and friends).
            if info.size == 0 {
                continue;
            }
            let data = self.input.slice(info.filepos, FLAT_WIDTH * FLAT_HEIGHT)?.to_vec();
            let flat = Rc::new(Flat {
                name: info.name.clone(),
                index: self.flats_list.len(),
                data,
            });
            self.flats.insert(info.name, flat.clone());
            self.flats_list.push(flat);
        }
        info!("loaded {} flats", self.flats.len());
        Ok(())
    }

    fn read_sprites(&mut self) -> Result<()> {
        debug!("loading sprites ...");
        let start = self.lump_num_or_err("S_START")?;
        let end = self.lump_num_or_err("S_END")?;
        for num in start + 1..end {
            let info = self.lump_infos[num].clone();
            if info.size == 0 {
                continue;
            }
            let picture = match self.get_picture(&info.name) {
                Ok(picture) => picture,
                Err(err) => {
                    warn!("skipping sprite lump {}: {}", info.name, err);
                    continue;
                }
            };
            self.add_sprite_picture(&info.name, picture);
        }
        info!("loaded {} sprites", self.sprites.len());
        Ok(())
    }

    /// Registers one sprite picture under its naming-convention slots:
    /// 4-char sprite prefix, frame letter, rotation digit, and optionally a
    /// second frame/rotation pair that reuses the picture mirrored.
    fn add_sprite_picture(&mut self, lump_name: &str, picture: Rc<Picture>) {
        let bytes = lump_name.as_bytes();
        if bytes.len() < 6 {
            warn!("sprite lump {} has no frame and rotation", lump_name);
            return;
        }
        let frame_letter = bytes[4];
        if frame_letter < b'A' || frame_letter > b'Z' {
            warn!("sprite lump {} has frame letter {:?}", lump_name, frame_letter as char);
            return;
        }
        let frame_index = (frame_letter - b'A') as usize;
        // '0' wraps to 0xFF and means omnidirectional.
        let rotation = bytes[5].wrapping_sub(b'1');
        if rotation != 0xFF && rotation >= 8 {
            warn!("sprite lump {} has rotation {:?}", lump_name, bytes[5] as char);
            return;
        }

        let base = &lump_name[..4];
        let sprite = self
            .sprites
            .entry(base.to_owned())
            .or_insert_with(|| Sprite {
                name: base.to_owned(),
                frames: Vec::new(),
            });
        while sprite.frames.len() <= frame_index {
            sprite.frames.push(SpriteFrame::default());
        }
        let frame = &mut sprite.frames[frame_index];

        if rotation == 0xFF {
            for slot in frame.rotations.iter_mut() {
                slot.picture = Some(picture.clone());
                slot.is_flipped = false;
            }
        } else {
            frame.rotations[rotation as usize].picture = Some(picture.clone());
            frame.rotations[rotation as usize].is_flipped = false;
        }

        if bytes.len() >= 8 {
            if bytes[6] != frame_letter {
                warn!("sprite lump {} mixes frame letters, dropping the mirrored pair", lump_name);
                return;
            }
            let rotation = bytes[7].wrapping_sub(b'1');
            if rotation == 0xFF {
                warn!("sprite lump {} mirrors an omnidirectional rotation", lump_name);
                return;
            }
            if rotation >= 8 {
                warn!("sprite lump {} has mirrored rotation {:?}", lump_name, bytes[7] as char);
                return;
            }
            let slot = &mut frame.rotations[rotation as usize];
            slot.picture = Some(picture);
            slot.is_flipped = true;
        }
    }

    fn read_sounds(&mut self) -> Result<()> {
        debug!("loading DS sounds ...");
        for num in 0..self.lump_infos.len() {
            let info = self.lump_infos[num].clone();
            if !info.name.starts_with("DS") {
                continue;
            }
            let (header, body) = {
                let buf = self.read_lump(num)?;
                match parse_sound_header(buf) {
                    Ok((header, body)) => (header, body.to_vec()),
                    Err(err) => {
                        warn!("skipping sound {}: {}", info.name, err);
                        continue;
                    }
                }
            };
            if header.format != 3 {
                warn!("skipping sound {} with unexpected format {}", info.name, header.format);
                continue;
            }
            let num_samples = match header.num_bytes.checked_sub(SOUND_PAD_BYTES) {
                Some(num_samples) => num_samples as usize,
                None => {
                    warn!("skipping sound {} shorter than its padding", info.name);
                    continue;
                }
            };
            if num_samples > body.len() {
                warn!(
                    "skipping sound {}: {} samples declared, {} bytes present",
                    info.name,
                    num_samples,
                    body.len()
                );
                continue;
            }
            self.sounds.insert(
                info.name,
                Sound {
                    sample_rate: header.sample_rate as u32,
                    samples: body[..num_samples].to_vec(),
                },
            );
        }
        info!("loaded {} sounds", self.sounds.len());
        Ok(())
    }

    fn read_music(&mut self) -> Result<()> {
        debug!("loading music ...");
        for num in 0..self.lump_infos.len() {
            let info = self.lump_infos[num].clone();
            if !info.name.starts_with("D_") {
                continue;
            }
            let parsed = {
                let buf = self.read_lump(num)?;
                parse_music_header(buf)
            };
            match parsed {
                // The event stream stays undecoded; keep a placeholder so
                // callers can see which scores exist.
                Ok(_header) => {
                    self.scores.insert(info.name, MusicScore::default());
                }
                Err(err) => {
                    warn!("skipping music {}: {}", info.name, err);
                }
            }
        }
        info!("loaded {} scores", self.scores.len());
        Ok(())
    }

    /// Looks a picture up in the cache, decoding and caching it on a miss.
    /// Repeated calls return the same allocation.
    pub fn get_picture(&mut self, name: &str) -> Result<Rc<Picture>> {
        let key = name.to_ascii_uppercase();
        if let Some(picture) = self.pictures.get(&key) {
            return Ok(picture.clone());
        }

        let num = self.lump_num_or_err(&key)?;
        let picture = {
            let buf = self.read_lump(num)?;
            parse_picture(&key, buf)?
        };
        let picture = Rc::new(picture);
        self.pictures.insert(key, picture.clone());
        Ok(picture)
    }

    /// Like `get_picture`, but absence and decode failures come back as
    /// `None` instead of an error.
    pub fn get_picture_opt(&mut self, name: &str) -> Option<Rc<Picture>> {
        match self.get_picture(name) {
            Ok(picture) => Some(picture),
            Err(err) => {
                debug!("no picture {}: {}", name, err);
                None
            }
        }
    }

    /// Sorted names of the levels the directory contains.
    pub fn level_names(&self) -> Vec<String> {
        self.level_index.keys().cloned().collect()
    }

    /// Decodes and links one level.  `make_user` is invoked once per sector
    /// and its value stored in that sector's user slot.
    pub fn read_level<U, F>(&self, name: &str, mut make_user: F) -> Result<Level<U>>
    where
        F: FnMut() -> U,
    {
        info!("reading level {} ...", name);
        let marker = match self.level_index.get(name) {
            Some(&marker) => marker,
            None => bail!(ErrorKind::LumpNotFound(name.to_owned())),
        };

        let mut level = Level::new();
        for num in marker + 1..marker + 11 {
            let lump_name = match self.lump_infos.get(num) {
                Some(info) => info.name.clone(),
                None => {
                    warn!("level {} runs past the end of the directory", name);
                    break;
                }
            };
            let buf = self.read_lump(num)?;
            match lump_name.as_str() {
                "THINGS" => {
                    let bares = nom_to_result("THINGS", things_lump(buf))?;
                    level.things = bares.iter().map(Thing::from_bare).collect();
                }
                "LINEDEFS" => {
                    let bares = nom_to_result("LINEDEFS", linedefs_lump(buf))?;
                    level.lines = bares.iter().map(Line::from_bare).collect();
                }
                "SIDEDEFS" => {
                    let bares = nom_to_result("SIDEDEFS", sidedefs_lump(buf))?;
                    level.sides = bares
                        .iter()
                        .map(|bare| Side::from_bare(bare, &self.textures))
                        .collect();
                }
                "VERTEXES" => {
                    let bares = nom_to_result("VERTEXES", vertexes_lump(buf))?;
                    level.vertexes = bares
                        .iter()
                        .map(|bare| Point::new(bare.x as f64, bare.y as f64))
                        .collect();
                }
                "SEGS" => {
                    let bares = nom_to_result("SEGS", segs_lump(buf))?;
                    level.segments = bares.iter().map(Segment::from_bare).collect();
                }
                "SSECTORS" => {
                    let bares = nom_to_result("SSECTORS", ssectors_lump(buf))?;
                    level.subsectors = bares.iter().map(Subsector::from_bare).collect();
                }
                "NODES" => {
                    let bares = nom_to_result("NODES", nodes_lump(buf))?;
                    level.nodes = bares.iter().map(Node::from_bare).collect();
                }
                "SECTORS" => {
                    let bares = nom_to_result("SECTORS", sectors_lump(buf))?;
                    level.sectors = bares
                        .iter()
                        .enumerate()
                        .map(|(index, bare)| {
                            Sector::from_bare(bare, index, &self.flats, make_user())
                        })
                        .collect();
                }
                "REJECT" => {
                    level.reject = Reject::from_lump(buf);
                }
                "BLOCKMAP" => {
                    level.blockmap = BlockMap::from_bare(parse_blockmap(buf)?);
                }
                other => {
                    warn!("unhandled level lump {}", other);
                }
            }
        }

        debug!("setting references ...");
        level.link()?;
        Ok(level)
    }
}
