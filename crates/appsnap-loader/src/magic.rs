//! Magic-number classification
//!
//! Every payload starts with a fixed prefix naming its kind. The prefixes
//! are mutually exclusive, so at most one matches any byte window.
//!
//! ```text
//! AppJIT      dc dc f6 f6 00 00 00 00
//! AOT         dc dc f6 f6 41 4f 54 <isa>
//! Kernel      90 ab cd ef
//! KernelList  23 40 64 69 6c 6c            "#@dill"
//! Gzip        1f 8b
//! ```

/// Length of the longest recognized prefix; callers sniff this many bytes.
pub const MAX_MAGIC_LEN: usize = 8;

const APP_JIT_MAGIC: [u8; 8] = [0xdc, 0xdc, 0xf6, 0xf6, 0x00, 0x00, 0x00, 0x00];
const AOT_MAGIC_STEM: [u8; 7] = [0xdc, 0xdc, 0xf6, 0xf6, b'A', b'O', b'T'];
const KERNEL_MAGIC: [u8; 4] = [0x90, 0xab, 0xcd, 0xef];
const KERNEL_LIST_MAGIC: [u8; 6] = *b"#@dill";
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Kind of payload, as named by its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MagicNumber {
    /// JIT image with warmed code
    AppJit,
    /// AOT image for x86_64
    AotX64,
    /// AOT image for aarch64
    AotArm64,
    /// AOT image for riscv64
    AotRiscv64,
    /// AOT image for 32-bit arm
    AotArm,
    /// AOT image for 32-bit x86
    AotIa32,
    /// AOT image for riscv32
    AotRiscv32,
    /// Kernel IR
    Kernel,
    /// List of Kernel files to concatenate
    KernelList,
    /// Gzip-compressed payload (transport only, never on a handle)
    Gzip,
    /// No prefix matched
    Unknown,
}

static AOT_PREFIXES: [[u8; 8]; 6] = aot_prefixes();

const fn aot_prefixes() -> [[u8; 8]; 6] {
    let mut table = [[0u8; 8]; 6];
    let mut i = 0;
    while i < 6 {
        let mut j = 0;
        while j < AOT_MAGIC_STEM.len() {
            table[i][j] = AOT_MAGIC_STEM[j];
            j += 1;
        }
        table[i][7] = (i + 1) as u8;
        i += 1;
    }
    table
}

const AOT_VARIANTS: [(MagicNumber, u8); 6] = [
    (MagicNumber::AotX64, 1),
    (MagicNumber::AotArm64, 2),
    (MagicNumber::AotRiscv64, 3),
    (MagicNumber::AotArm, 4),
    (MagicNumber::AotIa32, 5),
    (MagicNumber::AotRiscv32, 6),
];

impl MagicNumber {
    /// Classify the first bytes of a payload.
    ///
    /// `window` may be shorter than [`MAX_MAGIC_LEN`]; only prefixes that fit
    /// can match.
    pub fn sniff(window: &[u8]) -> MagicNumber {
        if window.starts_with(&APP_JIT_MAGIC) {
            return MagicNumber::AppJit;
        }
        if window.len() >= MAX_MAGIC_LEN && window.starts_with(&AOT_MAGIC_STEM) {
            let isa = window[AOT_MAGIC_STEM.len()];
            return AOT_VARIANTS
                .iter()
                .find(|(_, tag)| *tag == isa)
                .map(|(magic, _)| *magic)
                .unwrap_or(MagicNumber::Unknown);
        }
        if window.starts_with(&KERNEL_MAGIC) {
            return MagicNumber::Kernel;
        }
        if window.starts_with(&KERNEL_LIST_MAGIC) {
            return MagicNumber::KernelList;
        }
        if window.starts_with(&GZIP_MAGIC) {
            return MagicNumber::Gzip;
        }
        MagicNumber::Unknown
    }

    /// The prefix bytes for this kind (empty for `Unknown`).
    pub fn bytes(self) -> &'static [u8] {
        match self {
            MagicNumber::AppJit => &APP_JIT_MAGIC,
            MagicNumber::AotX64 => &AOT_PREFIXES[0],
            MagicNumber::AotArm64 => &AOT_PREFIXES[1],
            MagicNumber::AotRiscv64 => &AOT_PREFIXES[2],
            MagicNumber::AotArm => &AOT_PREFIXES[3],
            MagicNumber::AotIa32 => &AOT_PREFIXES[4],
            MagicNumber::AotRiscv32 => &AOT_PREFIXES[5],
            MagicNumber::Kernel => &KERNEL_MAGIC,
            MagicNumber::KernelList => &KERNEL_LIST_MAGIC,
            MagicNumber::Gzip => &GZIP_MAGIC,
            MagicNumber::Unknown => &[],
        }
    }

    /// Length of this kind's prefix.
    pub fn prefix_len(self) -> usize {
        self.bytes().len()
    }

    pub fn is_aot(self) -> bool {
        matches!(
            self,
            MagicNumber::AotX64
                | MagicNumber::AotArm64
                | MagicNumber::AotRiscv64
                | MagicNumber::AotArm
                | MagicNumber::AotIa32
                | MagicNumber::AotRiscv32
        )
    }

    /// Whether a handle may carry this kind.
    pub fn is_loadable(self) -> bool {
        !matches!(self, MagicNumber::Gzip | MagicNumber::Unknown)
    }

    /// Whether the payload uses the four-region directory layout.
    pub fn has_region_directory(self) -> bool {
        self == MagicNumber::AppJit || self.is_aot()
    }

    /// The AOT kind for the architecture this crate was built for.
    pub fn host_aot() -> Option<MagicNumber> {
        if cfg!(target_arch = "x86_64") {
            Some(MagicNumber::AotX64)
        } else if cfg!(target_arch = "aarch64") {
            Some(MagicNumber::AotArm64)
        } else if cfg!(target_arch = "riscv64") {
            Some(MagicNumber::AotRiscv64)
        } else if cfg!(target_arch = "arm") {
            Some(MagicNumber::AotArm)
        } else if cfg!(target_arch = "x86") {
            Some(MagicNumber::AotIa32)
        } else if cfg!(target_arch = "riscv32") {
            Some(MagicNumber::AotRiscv32)
        } else {
            None
        }
    }
}

/// Free-function form of [`MagicNumber::is_aot`].
pub fn is_aot_magic_number(magic: MagicNumber) -> bool {
    magic.is_aot()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [MagicNumber; 10] = [
        MagicNumber::AppJit,
        MagicNumber::AotX64,
        MagicNumber::AotArm64,
        MagicNumber::AotRiscv64,
        MagicNumber::AotArm,
        MagicNumber::AotIa32,
        MagicNumber::AotRiscv32,
        MagicNumber::Kernel,
        MagicNumber::KernelList,
        MagicNumber::Gzip,
    ];

    #[test]
    fn test_every_prefix_classifies_as_itself() {
        for magic in ALL {
            let mut window = magic.bytes().to_vec();
            window.extend_from_slice(&[0x55; 16]);
            assert_eq!(MagicNumber::sniff(&window), magic, "{:?}", magic);
        }
    }

    #[test]
    fn test_prefixes_are_mutually_exclusive() {
        for a in ALL {
            for b in ALL {
                if a != b {
                    assert!(
                        !a.bytes().starts_with(b.bytes()),
                        "{:?} shadows {:?}",
                        b,
                        a
                    );
                }
            }
        }
    }

    #[test]
    fn test_unknown() {
        assert_eq!(MagicNumber::sniff(&[]), MagicNumber::Unknown);
        assert_eq!(MagicNumber::sniff(b"\x7fELF\x02\x01\x01\x00"), MagicNumber::Unknown);
        assert_eq!(MagicNumber::sniff(&[0x90, 0xab, 0xcd]), MagicNumber::Unknown);
        // AOT stem with an unassigned ISA byte
        assert_eq!(
            MagicNumber::sniff(&[0xdc, 0xdc, 0xf6, 0xf6, b'A', b'O', b'T', 0x7f]),
            MagicNumber::Unknown
        );
        // Truncated AppJIT prefix
        assert_eq!(MagicNumber::sniff(&APP_JIT_MAGIC[..6]), MagicNumber::Unknown);
        assert!(MagicNumber::Unknown.bytes().is_empty());
    }

    #[test]
    fn test_predicates() {
        for magic in ALL {
            let classes = [
                magic == MagicNumber::AppJit,
                magic.is_aot(),
                magic == MagicNumber::Kernel,
                magic == MagicNumber::KernelList,
            ];
            let count = classes.iter().filter(|c| **c).count();
            if magic.is_loadable() {
                assert_eq!(count, 1, "{:?}", magic);
            } else {
                assert_eq!(count, 0, "{:?}", magic);
            }
            assert_eq!(is_aot_magic_number(magic), magic.is_aot());
        }
        assert!(MagicNumber::AppJit.has_region_directory());
        assert!(MagicNumber::AotArm64.has_region_directory());
        assert!(!MagicNumber::Kernel.has_region_directory());
    }

    #[test]
    fn test_host_aot_is_aot() {
        if let Some(magic) = MagicNumber::host_aot() {
            assert!(magic.is_aot());
            assert_eq!(magic.prefix_len(), MAX_MAGIC_LEN);
        }
    }
}
