//! Defines the instruction categories reported by the x86 decoder
//!
//! The category is the coarsest static property of a decoded instruction and the one the FLOP
//! model is keyed on: a category either can or cannot hold floating-point arithmetic, and a small
//! subset of them are fused multiply-add families that perform two operations per element.

use std::{fmt::Display, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InvalidCategoryError;

impl Display for InvalidCategoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid instruction category")
    }
}

impl std::error::Error for InvalidCategoryError {}

/// Internal macro used to define all categories in the [`InstCategory`] enum
macro_rules! define_categories {
    ( $( ($name:ident, $str_name:expr, $flop:expr, $fma:expr) ),* $(,)? ) => {
        /// Instruction category, as classified by the decoder.
        ///
        /// All the metadata the FLOP model needs from a category is available through the const
        /// methods on this enum.
        #[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, PartialOrd, Ord)]
        pub enum InstCategory {
            $(
                $name,
            )*
        }

        impl InstCategory {
            /// Returns the decoder's (string) name of the category
            pub const fn name(&self) -> &'static str {
                match self {
                    $(
                        Self::$name => $str_name,
                    )*
                }
            }

            /// Returns true if instructions of this category may perform floating-point
            /// arithmetic
            pub const fn is_flop(&self) -> bool {
                match self {
                    $(
                        Self::$name => $flop,
                    )*
                }
            }

            /// Returns true if this is a fused multiply-add family, i.e. every element costs a
            /// multiplication plus an addition
            pub const fn is_fma(&self) -> bool {
                match self {
                    $(
                        Self::$name => $fma,
                    )*
                }
            }

            /// Attempts to create an [`InstCategory`] from the decoder name, returning an error
            /// if the name is unknown
            pub fn try_from_name(st: &str) -> Result<InstCategory, InvalidCategoryError> {
                match st {
                    $(
                        $str_name => Ok(Self::$name),
                    )*
                    _ => Err(InvalidCategoryError)
                }
            }

            /// All the categories, in declaration order
            pub const ALL: &'static [InstCategory] = &[
                $(
                    Self::$name,
                )*
            ];
        }
    };
}

define_categories! {
    (Invalid, "INVALID", false, false),
    (ThreeDNow, "3DNOW", false, false),
    (AdoxAdcx, "ADOX_ADCX", false, false),
    (Aes, "AES", false, false),
    (AmxTile, "AMX_TILE", false, false),
    (Avx, "AVX", true, false),
    (Avx2, "AVX2", true, false),
    (Avx2Gather, "AVX2GATHER", false, false),
    (Avx512, "AVX512", true, false),
    (Avx512FourFmaps, "AVX512_4FMAPS", true, true),
    (Avx512FourVnniw, "AVX512_4VNNIW", false, false),
    (Avx512Bitalg, "AVX512_BITALG", false, false),
    (Avx512Vbmi, "AVX512_VBMI", false, false),
    (Avx512Vp2Intersect, "AVX512_VP2INTERSECT", false, false),
    (Binary, "BINARY", false, false),
    (BitByte, "BITBYTE", false, false),
    (Blend, "BLEND", false, false),
    (Bmi1, "BMI1", false, false),
    (Bmi2, "BMI2", false, false),
    (Broadcast, "BROADCAST", false, false),
    (Call, "CALL", false, false),
    (Cet, "CET", false, false),
    (Cldemote, "CLDEMOTE", false, false),
    (Clflushopt, "CLFLUSHOPT", false, false),
    (Clwb, "CLWB", false, false),
    (Clzero, "CLZERO", false, false),
    (Cmov, "CMOV", false, false),
    (Compress, "COMPRESS", false, false),
    (CondBr, "COND_BR", false, false),
    (Conflict, "CONFLICT", false, false),
    (Convert, "CONVERT", false, false),
    (DataXfer, "DATAXFER", false, false),
    (Decimal, "DECIMAL", false, false),
    (Enqcmd, "ENQCMD", false, false),
    (Expand, "EXPAND", false, false),
    (Fcmov, "FCMOV", false, false),
    (FlagOp, "FLAGOP", false, false),
    (Fma4, "FMA4", true, true),
    (Gather, "GATHER", false, false),
    (Gfni, "GFNI", false, false),
    (Hreset, "HRESET", false, false),
    (Ifma, "IFMA", true, true),
    (Interrupt, "INTERRUPT", false, false),
    (Io, "IO", false, false),
    (IoStringOp, "IOSTRINGOP", false, false),
    (KeyLocker, "KEYLOCKER", false, false),
    (KeyLockerWide, "KEYLOCKER_WIDE", false, false),
    (KMask, "KMASK", false, false),
    (Legacy, "LEGACY", false, false),
    (Logical, "LOGICAL", false, false),
    (LogicalFp, "LOGICAL_FP", false, false),
    (Lzcnt, "LZCNT", false, false),
    (Misc, "MISC", false, false),
    (Mmx, "MMX", true, false),
    (Movdir, "MOVDIR", false, false),
    (Mpx, "MPX", false, false),
    (Nop, "NOP", false, false),
    (Pclmulqdq, "PCLMULQDQ", false, false),
    (Pconfig, "PCONFIG", false, false),
    (Pku, "PKU", false, false),
    (Pop, "POP", false, false),
    (Prefetch, "PREFETCH", false, false),
    (PrefetchWt1, "PREFETCHWT1", false, false),
    (Ptwrite, "PTWRITE", false, false),
    (Push, "PUSH", false, false),
    (Rdpid, "RDPID", false, false),
    (Rdpru, "RDPRU", false, false),
    (Rdrand, "RDRAND", false, false),
    (Rdseed, "RDSEED", false, false),
    (RdwrFsgs, "RDWRFSGS", false, false),
    (Ret, "RET", false, false),
    (Rotate, "ROTATE", false, false),
    (Scatter, "SCATTER", false, false),
    (SegOp, "SEGOP", false, false),
    (Semaphore, "SEMAPHORE", false, false),
    (Serialize, "SERIALIZE", false, false),
    (SetCc, "SETCC", false, false),
    (Sgx, "SGX", false, false),
    (Sha, "SHA", false, false),
    (Shift, "SHIFT", false, false),
    (Smap, "SMAP", false, false),
    (Sse, "SSE", true, false),
    (StringOp, "STRINGOP", false, false),
    (Sttni, "STTNI", false, false),
    (Syscall, "SYSCALL", false, false),
    (Sysret, "SYSRET", false, false),
    (System, "SYSTEM", false, false),
    (Tbm, "TBM", false, false),
    (TsxLdtrk, "TSX_LDTRK", false, false),
    (Ufma, "UFMA", false, false),
    (Uintr, "UINTR", false, false),
    (UncondBr, "UNCOND_BR", false, false),
    (Vaes, "VAES", false, false),
    (Vbmi2, "VBMI2", false, false),
    (Vex, "VEX", false, false),
    (Vfma, "VFMA", true, true),
    (ViaPadlock, "VIA_PADLOCK", false, false),
    (Vpclmulqdq, "VPCLMULQDQ", false, false),
    (Vtx, "VTX", false, false),
    (WaitPkg, "WAITPKG", false, false),
    (WideNop, "WIDENOP", false, false),
    (X87Alu, "X87_ALU", true, false),
    (Xop, "XOP", false, false),
    (Xsave, "XSAVE", false, false),
    (Xsaveopt, "XSAVEOPT", false, false),
}

impl Display for InstCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for InstCategory {
    type Err = InvalidCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from_name(s)
    }
}

impl Serialize for InstCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for InstCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Self::try_from_name(&name)
            .map_err(|_| de::Error::custom(format!("unknown instruction category {name}")))
    }
}
