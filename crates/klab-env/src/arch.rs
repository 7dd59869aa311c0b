use anyhow::{bail, Result};
use serde::Serialize;

/// CPU architectures the harness can target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Arch {
    Arm,
    Aarch64,
    #[default]
    X86_64,
}

impl Arch {
    pub const ALL: [Arch; 3] = [Arch::Arm, Arch::Aarch64, Arch::X86_64];

    pub fn as_str(self) -> &'static str {
        match self {
            Arch::Arm => "arm",
            Arch::Aarch64 => "aarch64",
            Arch::X86_64 => "x86_64",
        }
    }

    /// Accepts the canonical name or its single-letter alias
    /// (`a` = arm, `A` = aarch64, `x` = x86_64; case-sensitive).
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "a" | "arm" => Ok(Arch::Arm),
            "A" | "aarch64" => Ok(Arch::Aarch64),
            "x" | "x86_64" => Ok(Arch::X86_64),
            other => bail!(
                "unsupported architecture: {other:?} (expected arm/a, aarch64/A or x86_64/x)"
            ),
        }
    }

    /// ARM instruction set version marker; x86_64 has none.
    pub fn armv(self) -> Option<u32> {
        match self {
            Arch::Arm => Some(7),
            Arch::Aarch64 => Some(8),
            Arch::X86_64 => None,
        }
    }

    /// gem5's internal architecture tag.
    pub fn gem5_arch(self) -> &'static str {
        match self {
            Arch::Arm | Arch::Aarch64 => "ARM",
            Arch::X86_64 => "X86",
        }
    }

    /// Kernel image location relative to the kernel build variant directory.
    pub fn linux_image_rel(self) -> &'static str {
        match self {
            Arch::Arm => "arch/arm/boot/zImage",
            Arch::Aarch64 => "arch/arm64/boot/Image",
            Arch::X86_64 => "arch/x86/boot/bzImage",
        }
    }

    pub fn qemu_system_basename(self) -> String {
        format!("qemu-system-{}", self.as_str())
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// clap value parser for `-a/--arch`.
pub fn parse_arch(s: &str) -> Result<Arch, String> {
    Arch::parse(s).map_err(|err| err.to_string())
}
