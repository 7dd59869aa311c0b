use serde::Serialize;

pub const QEMU_BASE_PORT: u32 = 45454;
pub const GEM5_TELNET_BASE_PORT: u32 = 3456;
pub const GEM5_GDB_BASE_PORT: u32 = 7000;

/// TCP ports claimed by one run.
///
/// Each offset owns a disjoint 10-wide QEMU block, so parallel runs with
/// distinct offsets never collide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PortAssignment {
    Qemu {
        monitor: u32,
        hostfwd_generic: u32,
        hostfwd_ssh: u32,
        gdb: u32,
    },
    Gem5 {
        telnet: u32,
        gdb: u32,
    },
}

impl PortAssignment {
    pub fn qemu(offset: u32) -> Self {
        let base = QEMU_BASE_PORT + 10 * offset;
        PortAssignment::Qemu {
            monitor: base,
            hostfwd_generic: base + 1,
            hostfwd_ssh: base + 2,
            gdb: base + 3,
        }
    }

    pub fn gem5(offset: u32) -> Self {
        PortAssignment::Gem5 {
            telnet: GEM5_TELNET_BASE_PORT + offset,
            gdb: GEM5_GDB_BASE_PORT + offset,
        }
    }

    /// The debugger port of whichever mode this assignment belongs to.
    pub fn gdb_port(self) -> u32 {
        match self {
            PortAssignment::Qemu { gdb, .. } => gdb,
            PortAssignment::Gem5 { gdb, .. } => gdb,
        }
    }
}

/// An explicit offset wins; otherwise the run ID when it parses as an
/// integer; otherwise 0.
pub fn resolve_port_offset(explicit: Option<u32>, run_id: &str) -> u32 {
    match explicit {
        Some(offset) => offset,
        None => run_id.parse().unwrap_or(0),
    }
}
