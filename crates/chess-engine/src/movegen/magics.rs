//! Sliding-piece attack lookup via magic bitboards.
//!
//! For every square, each subset of the relevant blocker mask is mapped to a
//! dense index and the ray-cast attack set for that subset is stored there.
//! Two index schemes fill the same layout:
//!
//! - [`IndexScheme::Multiply`]: `((occupied & mask) * magic) >> shift`, portable.
//! - [`IndexScheme::Pext`]: parallel bit extract of `occupied` under `mask`.
//!
//! Builds for a `bmi2` x86-64 target use the hardware `pext` instruction;
//! everything else uses the multiply scheme.
//!
//! The built-in magic numbers are verified while the table is filled. A magic
//! that produces a destructive collision is replaced by searching a new one,
//! so a bad constant can never yield a wrong attack set.

use crate::Bitboard;
use chess_core::{Piece, Square};
use std::sync::OnceLock;

/// The two sliding movement patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slider {
    Bishop,
    Rook,
}

impl Slider {
    const fn directions(self) -> [(i8, i8); 4] {
        match self {
            Slider::Bishop => [(1, 1), (1, -1), (-1, -1), (-1, 1)],
            Slider::Rook => [(0, 1), (1, 0), (0, -1), (-1, 0)],
        }
    }

    fn default_magics(self) -> &'static [u64; 64] {
        match self {
            Slider::Bishop => &BISHOP_MAGICS,
            Slider::Rook => &ROOK_MAGICS,
        }
    }
}

/// How a blocker configuration is turned into a table index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexScheme {
    Multiply,
    Pext,
}

impl IndexScheme {
    /// The scheme the global tables use for this build.
    pub const NATIVE: IndexScheme =
        if cfg!(all(target_arch = "x86_64", target_feature = "bmi2")) {
            IndexScheme::Pext
        } else {
            IndexScheme::Multiply
        };
}

/// Per-square lookup parameters.
#[derive(Debug, Clone, Copy)]
pub struct Magic {
    /// Relevant blockers: the rays from the square, minus each ray's last square.
    pub mask: Bitboard,
    pub magic: u64,
    /// `64 - mask.count()`.
    pub shift: u8,
    /// Start of this square's slice in the shared attack vector.
    pub offset: usize,
}

impl Magic {
    #[inline]
    fn multiply_index(&self, occupied: Bitboard) -> usize {
        ((occupied.0 & self.mask.0).wrapping_mul(self.magic) >> self.shift) as usize
    }
}

/// Attack lookup for one slider kind.
pub struct SliderTable {
    scheme: IndexScheme,
    magics: [Magic; 64],
    attacks: Vec<Bitboard>,
}

impl SliderTable {
    /// Builds the table with the built-in magic numbers.
    pub fn new(slider: Slider, scheme: IndexScheme) -> Self {
        Self::with_magics(slider, scheme, slider.default_magics())
    }

    /// Builds the table from caller-supplied magic numbers, replacing any that collide.
    pub fn with_magics(slider: Slider, scheme: IndexScheme, seeds: &[u64; 64]) -> Self {
        let mut magics = [Magic {
            mask: Bitboard::EMPTY,
            magic: 0,
            shift: 64,
            offset: 0,
        }; 64];
        let mut attacks = Vec::new();
        let mut subsets = Vec::with_capacity(4096);

        for index in 0..64u8 {
            let sq = Square::from_index_unchecked(index);
            let mask = relevant_mask(slider, sq);
            let bits = mask.count();
            let offset = attacks.len();
            attacks.resize(offset + (1usize << bits), Bitboard::EMPTY);

            subsets.clear();
            let mut blockers = Bitboard::EMPTY;
            loop {
                subsets.push((blockers, ray_attacks(slider, sq, blockers)));
                // Carry-rippler: next subset of `mask`.
                blockers = Bitboard(blockers.0.wrapping_sub(mask.0) & mask.0);
                if blockers.is_empty() {
                    break;
                }
            }

            let mut magic = Magic {
                mask,
                magic: seeds[index as usize],
                shift: (64 - bits) as u8,
                offset,
            };
            let slots = &mut attacks[offset..];

            match scheme {
                IndexScheme::Pext => {
                    for &(occupied, attack) in &subsets {
                        slots[pext(occupied.0, mask.0) as usize] = attack;
                    }
                }
                IndexScheme::Multiply => {
                    if !fill_slots(slots, &subsets, |occ| magic.multiply_index(occ)) {
                        magic.magic = find_magic(slots, &subsets, &magic, index);
                        tracing::debug!(square = %sq, ?slider, magic = magic.magic, "replaced colliding magic");
                    }
                }
            }
            magics[index as usize] = magic;
        }

        SliderTable {
            scheme,
            magics,
            attacks,
        }
    }

    #[inline]
    pub fn attacks(&self, sq: Square, occupied: Bitboard) -> Bitboard {
        let magic = &self.magics[sq.index()];
        let index = match self.scheme {
            IndexScheme::Multiply => magic.multiply_index(occupied),
            IndexScheme::Pext => pext(occupied.0, magic.mask.0) as usize,
        };
        self.attacks[magic.offset + index]
    }

    pub fn magic(&self, sq: Square) -> &Magic {
        &self.magics[sq.index()]
    }

    /// Total number of stored attack sets.
    pub fn len(&self) -> usize {
        self.attacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attacks.is_empty()
    }
}

/// Stores `subsets` into `slots` under `index`. Returns false on a destructive
/// collision (two subsets with different attack sets sharing a slot).
///
/// Every slider attack set is non-empty, so an empty slot means unused.
fn fill_slots(
    slots: &mut [Bitboard],
    subsets: &[(Bitboard, Bitboard)],
    index: impl Fn(Bitboard) -> usize,
) -> bool {
    slots.fill(Bitboard::EMPTY);
    for &(occupied, attack) in subsets {
        let slot = &mut slots[index(occupied)];
        if slot.is_empty() {
            *slot = attack;
        } else if *slot != attack {
            return false;
        }
    }
    true
}

/// Searches a collision-free magic for one square with a deterministic
/// sparse random generator. Leaves `slots` filled with the winning layout.
fn find_magic(
    slots: &mut [Bitboard],
    subsets: &[(Bitboard, Bitboard)],
    template: &Magic,
    square: u8,
) -> u64 {
    let mut rng = XorShift(0x2545_F491_4F6C_DD1D ^ ((square as u64 + 1) << 32));
    loop {
        let candidate = rng.sparse();
        // Cheap reject: good magics spread the mask into the top byte.
        if (template.mask.0.wrapping_mul(candidate) >> 56).count_ones() < 6 {
            continue;
        }
        let trial = Magic {
            magic: candidate,
            ..*template
        };
        if fill_slots(slots, subsets, |occ| trial.multiply_index(occ)) {
            return candidate;
        }
    }
}

struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn sparse(&mut self) -> u64 {
        self.next() & self.next() & self.next()
    }
}

#[inline]
fn pext(bits: u64, mask: u64) -> u64 {
    #[cfg(all(target_arch = "x86_64", target_feature = "bmi2"))]
    {
        // SAFETY: this branch is only compiled when bmi2 is enabled for the target.
        unsafe { core::arch::x86_64::_pext_u64(bits, mask) }
    }
    #[cfg(not(all(target_arch = "x86_64", target_feature = "bmi2")))]
    {
        soft_pext(bits, mask)
    }
}

/// Bit-by-bit parallel extract.
#[cfg_attr(all(target_arch = "x86_64", target_feature = "bmi2"), allow(dead_code))]
fn soft_pext(bits: u64, mut mask: u64) -> u64 {
    let mut out = 0u64;
    let mut dest = 1u64;
    while mask != 0 {
        let lowest = mask & mask.wrapping_neg();
        if bits & lowest != 0 {
            out |= dest;
        }
        dest <<= 1;
        mask &= mask - 1;
    }
    out
}

/// Square at signed coordinates. Negative values wrap above 127 and are rejected.
#[inline]
fn square_at(file: i8, rank: i8) -> Option<Square> {
    Square::from_coords(file as u8, rank as u8)
}

/// Relevant blocker mask: every ray square except the last one on each ray.
pub fn relevant_mask(slider: Slider, sq: Square) -> Bitboard {
    let (file, rank) = (sq.file_index() as i8, sq.rank_index() as i8);
    let mut mask = Bitboard::EMPTY;
    for (df, dr) in slider.directions() {
        let (mut f, mut r) = (file + df, rank + dr);
        while let (Some(here), Some(_)) = (square_at(f, r), square_at(f + df, r + dr)) {
            mask.set(here);
            f += df;
            r += dr;
        }
    }
    mask
}

/// Reference attack generation by walking each ray to the first blocker.
pub fn ray_attacks(slider: Slider, sq: Square, occupied: Bitboard) -> Bitboard {
    let (file, rank) = (sq.file_index() as i8, sq.rank_index() as i8);
    let mut attacks = Bitboard::EMPTY;
    for (df, dr) in slider.directions() {
        let (mut f, mut r) = (file + df, rank + dr);
        while let Some(target) = square_at(f, r) {
            attacks.set(target);
            if occupied.contains(target) {
                break;
            }
            f += df;
            r += dr;
        }
    }
    attacks
}

/// Bishop and rook lookup tables shared by the whole process.
pub struct AttackTables {
    pub bishop: SliderTable,
    pub rook: SliderTable,
}

static ATTACK_TABLES: OnceLock<AttackTables> = OnceLock::new();

/// The process-wide tables, built on first use.
pub fn attack_tables() -> &'static AttackTables {
    ATTACK_TABLES.get_or_init(|| {
        let tables = AttackTables {
            bishop: SliderTable::new(Slider::Bishop, IndexScheme::NATIVE),
            rook: SliderTable::new(Slider::Rook, IndexScheme::NATIVE),
        };
        tracing::debug!(
            scheme = ?IndexScheme::NATIVE,
            entries = tables.bishop.len() + tables.rook.len(),
            "built slider attack tables"
        );
        tables
    })
}

#[inline]
pub fn bishop_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    attack_tables().bishop.attacks(sq, occupied)
}

#[inline]
pub fn rook_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    attack_tables().rook.attacks(sq, occupied)
}

#[inline]
pub fn queen_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    let tables = attack_tables();
    tables.bishop.attacks(sq, occupied) | tables.rook.attacks(sq, occupied)
}

/// Attack set of a sliding piece; empty for non-sliders.
#[inline]
pub fn slider_attacks(piece: Piece, sq: Square, occupied: Bitboard) -> Bitboard {
    match piece {
        Piece::Bishop => bishop_attacks(sq, occupied),
        Piece::Rook => rook_attacks(sq, occupied),
        Piece::Queen => queen_attacks(sq, occupied),
        _ => Bitboard::EMPTY,
    }
}

const ROOK_MAGICS: [u64; 64] = [
    0x8a80104000800020, 0x0140002000100040, 0x02801880a0017001, 0x0100081001000420,
    0x0200020010080420, 0x03001c0002010008, 0x8480008002000100, 0x2080088004402900,
    0x0000800098204000, 0x2024401000200040, 0x0100802000801000, 0x0120800800801000,
    0x0208808088000400, 0x0002802200800400, 0x2200800100020080, 0x0801000060821100,
    0x0080044006422000, 0x0100808020004000, 0x12108a0010204200, 0x0140848010000802,
    0x0481828014002800, 0x8094004002004100, 0x4010040010010802, 0x0000020008806104,
    0x0100400080208000, 0x2040002120081000, 0x0021200680100081, 0x0020100080080080,
    0x0002000a00200410, 0x0000020080800400, 0x0080088400100102, 0x0080004600042881,
    0x4040008040800020, 0x0440003000200801, 0x0004200011004500, 0x0188020010100100,
    0x0014800401802800, 0x2080040080800200, 0x0124080204001001, 0x0200046502000484,
    0x0480400080088020, 0x1000422010034000, 0x0030200100110040, 0x0000100021010009,
    0x2002080100110004, 0x0202008004008002, 0x0020020004010100, 0x2048440040820001,
    0x0101002200408200, 0x0040802000401080, 0x4008142004410100, 0x02060820c0120200,
    0x0001001004080100, 0x020c020080040080, 0x2935610830022400, 0x0044440041009200,
    0x0280001040802101, 0x2100190040002085, 0x80c0084100102001, 0x4024081001000421,
    0x00020030a0244872, 0x0012001008414402, 0x02006104900a0804, 0x0001004081002402,
];

const BISHOP_MAGICS: [u64; 64] = [
    0x0040040844404084, 0x002004208a004208, 0x0010190041080202, 0x0108060845042010,
    0x0581104180800210, 0x2112080446200010, 0x1080820820060210, 0x03c0808410220200,
    0x0004050404440404, 0x0000021001420088, 0x24d0080801082102, 0x0001020a0a020400,
    0x0000040308200402, 0x0004011002100800, 0x0401484104104005, 0x0801010402020200,
    0x00400210c3880100, 0x0404022024108200, 0x0810018200204102, 0x0004002801a02003,
    0x0085040820080400, 0x810102c808880400, 0x000e900410884800, 0x8002020480840102,
    0x0220200865090201, 0x2010100a02021202, 0x0152048408022401, 0x0020080002081110,
    0x4001001021004000, 0x800040400a011002, 0x00e4004081011002, 0x001c004001012080,
    0x8004200962a00220, 0x8422100208500202, 0x2000402200300c08, 0x8646020080080080,
    0x80020a0200100808, 0x2010004880111000, 0x623000a080011400, 0x42008c0340209202,
    0x0209188240001000, 0x400408a884001800, 0x00110400a6080400, 0x1840060a44020800,
    0x0090080104000041, 0x0201011000808101, 0x1a2208080504f080, 0x8012020600211212,
    0x0500861011240000, 0x0180806108200800, 0x4000020e01040044, 0x300000261044000a,
    0x0802241102020002, 0x0020906061210001, 0x5a84841004010310, 0x0004010801011c04,
    0x000a010109502200, 0x0000004a02012000, 0x500201010098b028, 0x8040002811040900,
    0x0028000010020204, 0x06000020202d0240, 0x8918844842082200, 0x4010011029020020,
];
