use std::collections::HashMap;
use std::f64::consts::PI;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use bit_vec::BitVec;

use ::errors::{ErrorKind, Result};
use ::geom::{BlockBox, BoundBox, Point};
use ::graphics::{Flat, Texture};
use ::parse::map::{
    BareBlockMap, BareLine, BareNode, BareSector, BareSegment, BareSide, BareSubsector, BareThing,
};

/// Precalculated pad for sector block boxes.  The spider demon is larger,
/// but never has a moving sector nearby.
pub const MAX_RADIUS: f64 = 32.0;

/// Side of one blockmap cell in map units.
pub const BLOCK_UNITS: f64 = 128.0;

/// A typed index into one of a level's component arrays.  Resolved
/// references all take this form; the arrays themselves stay canonical.
pub struct Handle<T>(pub usize, PhantomData<*const T>);

// Hand-written impls: a #[derive] would demand the same trait of T, and a
// handle never owns a T.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Handle(self.0, PhantomData)
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl<T> Eq for Handle<T> {}

impl<T> ::std::hash::Hash for Handle<T> {
    fn hash<H: ::std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Handle({})", self.0)
    }
}

impl<T> From<usize> for Handle<T> {
    fn from(index: usize) -> Self {
        Handle(index, PhantomData)
    }
}

/// Marker for sector handles.  `Sector` is generic over caller-supplied
/// user state, so its handles are tagged with this marker to keep lines,
/// sides, segments and subsectors non-generic.
pub enum SectorMark {}

pub type SectorHandle = Handle<SectorMark>;

/// Map vertexes are plain points once the i16 disk coordinates are promoted.
pub type Vertex = Point;

/// A placeable map entity: player start, monster, item, decoration.
#[derive(Clone, Debug)]
pub struct Thing {
    pub position: Point,
    /// Facing angle in radians (stored in degrees on disk).
    pub angle: f64,
    pub kind: i32,
    pub options: u16,
}

impl Thing {
    pub fn on_skill_1_2(&self) -> bool {
        self.options & 0x1 != 0
    }
    pub fn on_skill_3(&self) -> bool {
        self.options & 0x2 != 0
    }
    pub fn on_skill_4_5(&self) -> bool {
        self.options & 0x4 != 0
    }
    pub fn is_ambush(&self) -> bool {
        self.options & 0x8 != 0
    }
    pub fn is_multiplayer_only(&self) -> bool {
        self.options & 0x10 != 0
    }

    pub fn from_bare(bare: &BareThing) -> Thing {
        Thing {
            position: Point::new(bare.x as f64, bare.y as f64),
            angle: degrees_to_radians(bare.angle),
            kind: bare.kind as i32,
            options: bare.options,
        }
    }
}

/// Gross direction of a line, cached to speed up move clipping.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SlopeType {
    Horizontal,
    Vertical,
    Positive,
    Negative,
}

pub struct Line {
    pub v1_num: i32,
    pub v2_num: i32,
    pub flags: u16,
    pub special: i32,
    pub sector_tag: i32,
    // -1 means no side
    pub side_r_num: i32,
    pub side_l_num: i32,

    // Resolved by the linker
    pub v1: Handle<Vertex>,
    pub v2: Handle<Vertex>,
    pub dx: f64,
    pub dy: f64,
    pub side_r: Option<Handle<Side>>,
    pub side_l: Option<Handle<Side>>,
    pub front_sector: Option<SectorHandle>,
    pub back_sector: Option<SectorHandle>,
    /// Every sector whose tag equals this line's sector tag.
    pub tagged_sectors: Vec<SectorHandle>,
    pub slope_type: SlopeType,
    pub bounding_box: BoundBox,
}

impl Line {
    pub fn blocks_players_and_monsters(&self) -> bool {
        self.flags & 0x1 != 0
    }
    pub fn blocks_monsters(&self) -> bool {
        self.flags & 0x2 != 0
    }
    pub fn is_two_sided(&self) -> bool {
        self.flags & 0x4 != 0
    }
    pub fn is_upper_unpegged(&self) -> bool {
        self.flags & 0x8 != 0
    }
    pub fn is_lower_unpegged(&self) -> bool {
        self.flags & 0x10 != 0
    }
    pub fn is_secret(&self) -> bool {
        self.flags & 0x20 != 0
    }
    pub fn blocks_sound(&self) -> bool {
        self.flags & 0x40 != 0
    }
    pub fn is_never_on_map(&self) -> bool {
        self.flags & 0x80 != 0
    }
    pub fn is_always_on_map(&self) -> bool {
        self.flags & 0x100 != 0
    }

    pub fn from_bare(bare: &BareLine) -> Line {
        Line {
            v1_num: bare.v1 as i32,
            v2_num: bare.v2 as i32,
            flags: bare.flags,
            special: bare.special as i32,
            sector_tag: bare.sector_tag as i32,
            side_r_num: bare.side_r as i32,
            side_l_num: bare.side_l as i32,
            v1: Handle::from(0),
            v2: Handle::from(0),
            dx: 0.0,
            dy: 0.0,
            side_r: None,
            side_l: None,
            front_sector: None,
            back_sector: None,
            tagged_sectors: Vec::new(),
            slope_type: SlopeType::Horizontal,
            bounding_box: BoundBox::default(),
        }
    }
}

pub struct Side {
    pub x_offset: f64,
    pub y_offset: f64,
    pub upper_texture_name: String,
    pub lower_texture_name: String,
    pub middle_texture_name: String,
    pub sector_num: i32,

    /// Texture refs are absent when the name (often the "-" placeholder)
    /// isn't in the archive's texture map.
    pub upper_texture: Option<Rc<Texture>>,
    pub lower_texture: Option<Rc<Texture>>,
    pub middle_texture: Option<Rc<Texture>>,
    pub sector: SectorHandle,
}

impl Side {
    pub fn from_bare(bare: &BareSide, textures: &HashMap<String, Rc<Texture>>) -> Side {
        Side {
            x_offset: bare.x_offset as f64,
            y_offset: bare.y_offset as f64,
            upper_texture: textures.get(&bare.upper_texture).cloned(),
            lower_texture: textures.get(&bare.lower_texture).cloned(),
            middle_texture: textures.get(&bare.middle_texture).cloned(),
            upper_texture_name: bare.upper_texture.clone(),
            lower_texture_name: bare.lower_texture.clone(),
            middle_texture_name: bare.middle_texture.clone(),
            sector_num: bare.sector as i32,
            sector: Handle::from(0),
        }
    }
}

/// A piece of a linedef produced by the BSP split, bounding one edge of a
/// subsector.
pub struct Segment {
    pub v1_num: i32,
    pub v2_num: i32,
    /// Radians, converted from the on-disk binary angle.
    pub angle: f64,
    pub line_num: i32,
    /// Whether the segment runs opposite to its linedef.
    pub is_side_l: bool,
    /// Distance along the linedef to the start of the segment.
    pub offset: f64,

    // Resolved by the linker
    pub v1: Handle<Vertex>,
    pub v2: Handle<Vertex>,
    pub line: Handle<Line>,
    pub side: Handle<Side>,
    pub front_sector: SectorHandle,
    pub back_sector: Option<SectorHandle>,
}

impl Segment {
    pub fn from_bare(bare: &BareSegment) -> Segment {
        Segment {
            v1_num: bare.v1 as i32,
            v2_num: bare.v2 as i32,
            angle: bam_to_radians(bare.angle),
            line_num: bare.line as i32,
            is_side_l: bare.direction == 1,
            offset: bare.offset as f64,
            v1: Handle::from(0),
            v2: Handle::from(0),
            line: Handle::from(0),
            side: Handle::from(0),
            front_sector: Handle::from(0),
            back_sector: None,
        }
    }
}

/// A convex leaf of the BSP tree holding a contiguous run of segments.
pub struct Subsector {
    pub num_segments: i32,
    pub start_segment: i32,

    pub sector: SectorHandle,
}

impl Subsector {
    pub fn from_bare(bare: &BareSubsector) -> Subsector {
        Subsector {
            num_segments: bare.num_segments as i32,
            start_segment: bare.start_segment as i32,
            sector: Handle::from(0),
        }
    }
}

/// What a BSP child slot points at.  On disk the discriminator is the sign
/// bit of the child word; it never leaks past the linker.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BspChild {
    Node(Handle<Node>),
    Subsector(Handle<Subsector>),
}

pub struct Node {
    /// The partition line.
    pub x: f64,
    pub y: f64,
    pub dx: f64,
    pub dy: f64,
    pub bbox_r: BoundBox,
    pub bbox_l: BoundBox,
    pub child_num_r: i16,
    pub child_num_l: i16,

    // Resolved by the linker
    pub child_r: BspChild,
    pub child_l: BspChild,
}

impl Node {
    /// Child for a side: 0 is right, 1 is left.
    pub fn child(&self, side: usize) -> BspChild {
        if side == 0 {
            self.child_r
        } else {
            self.child_l
        }
    }

    /// Bounding box for a side: 0 is right, 1 is left.
    pub fn bound_box(&self, side: usize) -> &BoundBox {
        if side == 0 {
            &self.bbox_r
        } else {
            &self.bbox_l
        }
    }

    pub fn from_bare(bare: &BareNode) -> Node {
        Node {
            x: bare.x as f64,
            y: bare.y as f64,
            dx: bare.dx as f64,
            dy: bare.dy as f64,
            bbox_r: BoundBox {
                top: bare.bbox_r.top as f64,
                bottom: bare.bbox_r.bottom as f64,
                left: bare.bbox_r.left as f64,
                right: bare.bbox_r.right as f64,
            },
            bbox_l: BoundBox {
                top: bare.bbox_l.top as f64,
                bottom: bare.bbox_l.bottom as f64,
                left: bare.bbox_l.left as f64,
                right: bare.bbox_l.right as f64,
            },
            child_num_r: bare.child_r,
            child_num_l: bare.child_l,
            child_r: BspChild::Subsector(Handle::from(0)),
            child_l: BspChild::Subsector(Handle::from(0)),
        }
    }
}

/// The 18 vanilla sector effects.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SectorKind {
    Normal,
    BlinkRandom,
    Blink05,
    Blink10,
    Damage20Blink05,
    Damage10,
    Unused6,
    Damage5,
    Oscillate,
    Secret,
    Door30,
    End,
    Blink10Sync,
    Blink05Sync,
    Door300,
    Unused15,
    Damage20,
    FlickerRandom,
}

impl SectorKind {
    pub fn from_raw(raw: i16) -> Option<SectorKind> {
        Some(match raw {
            0 => SectorKind::Normal,
            1 => SectorKind::BlinkRandom,
            2 => SectorKind::Blink05,
            3 => SectorKind::Blink10,
            4 => SectorKind::Damage20Blink05,
            5 => SectorKind::Damage10,
            6 => SectorKind::Unused6,
            7 => SectorKind::Damage5,
            8 => SectorKind::Oscillate,
            9 => SectorKind::Secret,
            10 => SectorKind::Door30,
            11 => SectorKind::End,
            12 => SectorKind::Blink10Sync,
            13 => SectorKind::Blink05Sync,
            14 => SectorKind::Door300,
            15 => SectorKind::Unused15,
            16 => SectorKind::Damage20,
            17 => SectorKind::FlickerRandom,
            _ => return None,
        })
    }
}

/// A region of the map with one floor and ceiling.  `U` is caller-chosen
/// per-sector state, produced by the builder handed to `read_level`.
pub struct Sector<U> {
    pub index: usize,
    pub floor_height: f64,
    pub ceiling_height: f64,
    pub floor_flat_name: String,
    pub ceiling_flat_name: String,
    pub light_level: i32,
    pub kind: SectorKind,
    pub tag: i32,

    pub floor_flat: Option<Rc<Flat>>,
    pub ceiling_flat: Option<Rc<Flat>>,

    // Resolved by the linker
    pub lines: Vec<Handle<Line>>,
    /// Origin for any sounds the sector plays: the centre of its lines'
    /// bounding box.
    pub sound_origin: Point,
    /// Blockmap extent, used for height-change checks.
    pub block_box: BlockBox,

    pub user: U,
}

impl<U> Sector<U> {
    pub fn from_bare(
        bare: &BareSector,
        index: usize,
        flats: &HashMap<String, Rc<Flat>>,
        user: U,
    ) -> Sector<U> {
        let kind = match SectorKind::from_raw(bare.kind) {
            Some(kind) => kind,
            None => {
                warn!("sector {} has unknown type {}, treating as normal", index, bare.kind);
                SectorKind::Normal
            }
        };
        Sector {
            index,
            floor_height: bare.floor_height as f64,
            ceiling_height: bare.ceiling_height as f64,
            floor_flat: flats.get(&bare.floor_flat).cloned(),
            ceiling_flat: flats.get(&bare.ceiling_flat).cloned(),
            floor_flat_name: bare.floor_flat.clone(),
            ceiling_flat_name: bare.ceiling_flat.clone(),
            light_level: bare.light_level as i32,
            kind,
            tag: bare.tag as i32,
            lines: Vec::new(),
            sound_origin: Point::new(0.0, 0.0),
            block_box: BlockBox::default(),
            user,
        }
    }
}

/// The sector-to-sector visibility matrix, used to short-circuit
/// line-of-sight checks.  All-zero (nothing rejected) is the permissive
/// default.
#[derive(Clone, Debug, PartialEq)]
pub struct Reject {
    num_sectors: usize,
    bits: BitVec,
}

impl Reject {
    pub fn empty() -> Reject {
        Reject {
            num_sectors: 0,
            bits: BitVec::new(),
        }
    }

    /// Decodes a REJECT lump.  The matrix side is the integer square root
    /// of the bit count; cell `s1 * n + s2` lives at bit `cell % 8` of byte
    /// `cell / 8`.
    pub fn from_lump(buf: &[u8]) -> Reject {
        let num_sectors = ((8 * buf.len()) as f64).sqrt() as usize;
        let mut bits = BitVec::from_elem(num_sectors * num_sectors, false);
        for cell in 0..num_sectors * num_sectors {
            if (buf[cell / 8] >> (cell % 8)) & 1 != 0 {
                bits.set(cell, true);
            }
        }
        Reject { num_sectors, bits }
    }

    pub fn num_sectors(&self) -> usize {
        self.num_sectors
    }

    /// Whether sight lines from sector `s1` to sector `s2` are rejected.
    pub fn get(&self, s1: usize, s2: usize) -> bool {
        self.bits.get(s1 * self.num_sectors + s2).unwrap_or(false)
    }
}

/// One cell of the blockmap: the lines crossing that 128x128 block.
pub struct Block {
    pub line_nums: Vec<usize>,
    pub lines: Vec<Handle<Line>>,
}

/// Spatial index over the level's lines, used to speed up collision
/// detection by 2-D subdivision.
pub struct BlockMap {
    pub origin_x: f64,
    pub origin_y: f64,
    pub columns: usize,
    pub rows: usize,
    pub blocks: Vec<Block>,
}

impl BlockMap {
    pub fn empty() -> BlockMap {
        BlockMap {
            origin_x: 0.0,
            origin_y: 0.0,
            columns: 0,
            rows: 0,
            blocks: Vec::new(),
        }
    }

    pub fn from_bare(bare: BareBlockMap) -> BlockMap {
        BlockMap {
            origin_x: bare.origin_x as f64,
            origin_y: bare.origin_y as f64,
            columns: bare.columns as usize,
            rows: bare.rows as usize,
            blocks: bare
                .block_line_nums
                .into_iter()
                .map(|line_nums| Block {
                    line_nums,
                    lines: Vec::new(),
                })
                .collect(),
        }
    }

    pub fn block(&self, x: usize, y: usize) -> &Block {
        &self.blocks[y * self.columns + x]
    }
}

/// A fully linked level: canonical component arrays plus the resolved
/// cross-references between them.
pub struct Level<U> {
    pub things: Vec<Thing>,
    pub lines: Vec<Line>,
    pub sides: Vec<Side>,
    pub vertexes: Vec<Vertex>,
    pub segments: Vec<Segment>,
    pub subsectors: Vec<Subsector>,
    pub nodes: Vec<Node>,
    pub sectors: Vec<Sector<U>>,
    pub reject: Reject,
    pub blockmap: BlockMap,
    /// The last node in the node list, where BSP traversal starts.
    pub root_node: Option<Handle<Node>>,
}

impl<U> Level<U> {
    pub fn new() -> Level<U> {
        Level {
            things: Vec::new(),
            lines: Vec::new(),
            sides: Vec::new(),
            vertexes: Vec::new(),
            segments: Vec::new(),
            subsectors: Vec::new(),
            nodes: Vec::new(),
            sectors: Vec::new(),
            reject: Reject::empty(),
            blockmap: BlockMap::empty(),
            root_node: None,
        }
    }

    pub fn vertex(&self, handle: Handle<Vertex>) -> &Vertex {
        &self.vertexes[handle.0]
    }

    pub fn line(&self, handle: Handle<Line>) -> &Line {
        &self.lines[handle.0]
    }

    pub fn side(&self, handle: Handle<Side>) -> &Side {
        &self.sides[handle.0]
    }

    pub fn segment(&self, handle: Handle<Segment>) -> &Segment {
        &self.segments[handle.0]
    }

    pub fn subsector(&self, handle: Handle<Subsector>) -> &Subsector {
        &self.subsectors[handle.0]
    }

    pub fn node(&self, handle: Handle<Node>) -> &Node {
        &self.nodes[handle.0]
    }

    pub fn sector(&self, handle: SectorHandle) -> &Sector<U> {
        &self.sectors[handle.0]
    }

    pub fn sector_mut(&mut self, handle: SectorHandle) -> &mut Sector<U> {
        &mut self.sectors[handle.0]
    }

    /// The contiguous run of segments bounding a subsector.
    pub fn subsector_segments(&self, handle: Handle<Subsector>) -> &[Segment] {
        let subsector = &self.subsectors[handle.0];
        let start = subsector.start_segment as usize;
        &self.segments[start..start + subsector.num_segments as usize]
    }

    /// Resolves every cross-table index into a typed handle and computes the
    /// derived fields.  The step order matters: lines need sides, segments
    /// need lines, subsectors need segments, sectors need lines.
    pub(crate) fn link(&mut self) -> Result<()> {
        self.link_sides()?;
        self.link_lines()?;
        self.link_segments()?;
        self.link_subsectors()?;
        self.link_nodes()?;
        self.link_sectors();
        self.link_blockmap()?;
        Ok(())
    }

    fn link_sides(&mut self) -> Result<()> {
        let num_sectors = self.sectors.len();
        for (i, side) in self.sides.iter_mut().enumerate() {
            if side.sector_num < 0 || side.sector_num as usize >= num_sectors {
                bail!(ErrorKind::BadLump(
                    "SIDEDEFS",
                    format!("side {} references sector {}", i, side.sector_num)
                ));
            }
            side.sector = Handle::from(side.sector_num as usize);
        }
        Ok(())
    }

    fn link_lines(&mut self) -> Result<()> {
        for i in 0..self.lines.len() {
            let (v1_num, v2_num, side_r_num, side_l_num, sector_tag) = {
                let line = &self.lines[i];
                (
                    line.v1_num,
                    line.v2_num,
                    line.side_r_num,
                    line.side_l_num,
                    line.sector_tag,
                )
            };
            let v1 = self.checked_vertex("LINEDEFS", i, v1_num)?;
            let v2 = self.checked_vertex("LINEDEFS", i, v2_num)?;
            let p1 = self.vertexes[v1.0];
            let p2 = self.vertexes[v2.0];
            let side_r = self.checked_side("LINEDEFS", i, side_r_num)?;
            let side_l = self.checked_side("LINEDEFS", i, side_l_num)?;
            let front_sector = side_r.map(|handle| self.sides[handle.0].sector);
            let back_sector = side_l.map(|handle| self.sides[handle.0].sector);
            let tagged_sectors = self
                .sectors
                .iter()
                .enumerate()
                .filter(|&(_, sector)| sector.tag == sector_tag)
                .map(|(j, _)| Handle::from(j))
                .collect();

            let line = &mut self.lines[i];
            line.v1 = v1;
            line.v2 = v2;
            line.dx = p2.x - p1.x;
            line.dy = p2.y - p1.y;
            line.side_r = side_r;
            line.side_l = side_l;
            line.front_sector = front_sector;
            line.back_sector = back_sector;
            line.tagged_sectors = tagged_sectors;
            line.slope_type = if line.dx == 0.0 {
                SlopeType::Vertical
            } else if line.dy == 0.0 {
                SlopeType::Horizontal
            } else if line.dy / line.dx > 0.0 {
                SlopeType::Positive
            } else {
                SlopeType::Negative
            };
            line.bounding_box = BoundBox {
                left: p1.x.min(p2.x),
                right: p1.x.max(p2.x),
                bottom: p1.y.min(p2.y),
                top: p1.y.max(p2.y),
            };
        }
        Ok(())
    }

    fn link_segments(&mut self) -> Result<()> {
        for i in 0..self.segments.len() {
            let (v1_num, v2_num, line_num, is_side_l) = {
                let segment = &self.segments[i];
                (
                    segment.v1_num,
                    segment.v2_num,
                    segment.line_num,
                    segment.is_side_l,
                )
            };
            let v1 = self.checked_vertex("SEGS", i, v1_num)?;
            let v2 = self.checked_vertex("SEGS", i, v2_num)?;
            if line_num < 0 || line_num as usize >= self.lines.len() {
                bail!(ErrorKind::BadLump(
                    "SEGS",
                    format!("segment {} references line {}", i, line_num)
                ));
            }
            let line = Handle::from(line_num as usize);
            let (side_num, other_side_num, two_sided) = {
                let line = &self.lines[line.0];
                if is_side_l {
                    (line.side_l_num, line.side_r_num, line.is_two_sided())
                } else {
                    (line.side_r_num, line.side_l_num, line.is_two_sided())
                }
            };
            if side_num < 0 || side_num as usize >= self.sides.len() {
                bail!(ErrorKind::BadLump(
                    "SEGS",
                    format!("segment {} lies on a missing side of line {}", i, line_num)
                ));
            }
            let side: Handle<Side> = Handle::from(side_num as usize);
            let front_sector = self.sides[side.0].sector;
            let back_sector = if two_sided {
                if other_side_num >= 0 && (other_side_num as usize) < self.sides.len() {
                    Some(self.sides[other_side_num as usize].sector)
                } else {
                    warn!("two-sided line {} is missing its other side", line_num);
                    None
                }
            } else {
                None
            };

            let segment = &mut self.segments[i];
            segment.v1 = v1;
            segment.v2 = v2;
            segment.line = line;
            segment.side = side;
            segment.front_sector = front_sector;
            segment.back_sector = back_sector;
        }
        Ok(())
    }

    fn link_subsectors(&mut self) -> Result<()> {
        for i in 0..self.subsectors.len() {
            let (start, count) = {
                let subsector = &self.subsectors[i];
                (subsector.start_segment, subsector.num_segments)
            };
            if start < 0 || count <= 0
                || (start as usize) + (count as usize) > self.segments.len()
            {
                bail!(ErrorKind::BadLump(
                    "SSECTORS",
                    format!("subsector {} spans segments {}..{}+{}", i, start, start, count)
                ));
            }
            self.subsectors[i].sector = self.segments[start as usize].front_sector;
        }
        Ok(())
    }

    fn link_nodes(&mut self) -> Result<()> {
        let num_nodes = self.nodes.len();
        let num_subsectors = self.subsectors.len();
        for i in 0..num_nodes {
            let (raw_r, raw_l) = {
                let node = &self.nodes[i];
                (node.child_num_r, node.child_num_l)
            };
            let child_r = checked_child(i, raw_r, num_nodes, num_subsectors)?;
            let child_l = checked_child(i, raw_l, num_nodes, num_subsectors)?;
            let node = &mut self.nodes[i];
            node.child_r = child_r;
            node.child_l = child_l;
        }
        self.root_node = if num_nodes == 0 {
            None
        } else {
            Some(Handle::from(num_nodes - 1))
        };
        Ok(())
    }

    fn link_sectors(&mut self) {
        let mut staged = Vec::with_capacity(self.sectors.len());
        for s in 0..self.sectors.len() {
            let handle: SectorHandle = Handle::from(s);
            let mut lines = Vec::new();
            let mut bbox = BoundBox::inverted();
            for (j, line) in self.lines.iter().enumerate() {
                if line.front_sector == Some(handle) || line.back_sector == Some(handle) {
                    lines.push(Handle::from(j));
                    bbox.add(self.vertexes[line.v1.0]);
                    bbox.add(self.vertexes[line.v2.0]);
                }
            }
            let (sound_origin, block_box) = if lines.is_empty() {
                // Degenerate sector with no lines
                (Point::new(0.0, 0.0), BlockBox::default())
            } else {
                let origin = Point::new(
                    (bbox.right + bbox.left) / 2.0,
                    (bbox.top + bbox.bottom) / 2.0,
                );
                (origin, self.block_box_for(&bbox))
            };
            staged.push((lines, sound_origin, block_box));
        }
        for (sector, (lines, sound_origin, block_box)) in self.sectors.iter_mut().zip(staged) {
            sector.lines = lines;
            sector.sound_origin = sound_origin;
            sector.block_box = block_box;
        }
    }

    /// Converts a world bounding box, padded by `MAX_RADIUS`, to clamped
    /// blockmap cell coordinates.
    fn block_box_for(&self, bbox: &BoundBox) -> BlockBox {
        let blockmap = &self.blockmap;
        if blockmap.columns == 0 || blockmap.rows == 0 {
            return BlockBox::default();
        }
        let to_block = |value: f64, upper: usize| -> usize {
            let block = (value / BLOCK_UNITS).floor();
            if block < 0.0 {
                0
            } else if block as usize > upper {
                upper
            } else {
                block as usize
            }
        };
        BlockBox {
            top: to_block(bbox.top - blockmap.origin_y + MAX_RADIUS, blockmap.rows - 1),
            bottom: to_block(bbox.bottom - blockmap.origin_y - MAX_RADIUS, blockmap.rows - 1),
            left: to_block(bbox.left - blockmap.origin_x - MAX_RADIUS, blockmap.columns - 1),
            right: to_block(bbox.right - blockmap.origin_x + MAX_RADIUS, blockmap.columns - 1),
        }
    }

    fn link_blockmap(&mut self) -> Result<()> {
        let num_lines = self.lines.len();
        for (i, block) in self.blockmap.blocks.iter_mut().enumerate() {
            block.lines.clear();
            for &line_num in &block.line_nums {
                if line_num >= num_lines {
                    bail!(ErrorKind::BadLump(
                        "BLOCKMAP",
                        format!("block {} references line {}", i, line_num)
                    ));
                }
                block.lines.push(Handle::from(line_num));
            }
        }
        Ok(())
    }

    fn checked_vertex(&self, whence: &'static str, i: usize, num: i32) -> Result<Handle<Vertex>> {
        if num < 0 || num as usize >= self.vertexes.len() {
            bail!(ErrorKind::BadLump(
                whence,
                format!("record {} references vertex {}", i, num)
            ));
        }
        Ok(Handle::from(num as usize))
    }

    fn checked_side(
        &self,
        whence: &'static str,
        i: usize,
        num: i32,
    ) -> Result<Option<Handle<Side>>> {
        if num < 0 {
            return Ok(None);
        }
        if num as usize >= self.sides.len() {
            bail!(ErrorKind::BadLump(
                whence,
                format!("record {} references side {}", i, num)
            ));
        }
        Ok(Some(Handle::from(num as usize)))
    }
}

fn checked_child(
    node: usize,
    raw: i16,
    num_nodes: usize,
    num_subsectors: usize,
) -> Result<BspChild> {
    if raw < 0 {
        let index = (raw & 0x7FFF) as usize;
        if index >= num_subsectors {
            bail!(ErrorKind::BadLump(
                "NODES",
                format!("node {} references subsector {}", node, index)
            ));
        }
        Ok(BspChild::Subsector(Handle::from(index)))
    } else {
        let index = raw as usize;
        if index >= num_nodes {
            bail!(ErrorKind::BadLump(
                "NODES",
                format!("node {} references node {}", node, index)
            ));
        }
        Ok(BspChild::Node(Handle::from(index)))
    }
}

fn degrees_to_radians(degrees: i16) -> f64 {
    degrees as f64 * (PI / 180.0)
}

/// Binary angle measurement to radians: the full signed 16-bit range maps
/// onto one turn.
fn bam_to_radians(bam: i16) -> f64 {
    ((bam as f64) + 32768.0) * PI / 32768.0
}
