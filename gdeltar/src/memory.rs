use sysinfo::{MemoryRefreshKind, RefreshKind, System};

/// Total physical memory of the machine, if the platform exposes it.
pub fn total_memory_bytes() -> Option<u64> {
    let system = System::new_with_specifics(
        RefreshKind::new().with_memory(MemoryRefreshKind::new().with_ram()),
    );
    match system.total_memory() {
        0 => None,
        bytes => Some(bytes),
    }
}
