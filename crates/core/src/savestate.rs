//! Save state (quick save / quick load) for the emulator.
//!
//! Captures the full machine state to a file using bincode
//! serialization with deflate compression.
//!
//! ## File format
//!
//! ```text
//! +------------------+
//! | Magic "M43S"     |  4 bytes
//! +------------------+
//! | Format version   |  u32 little-endian (currently 1)
//! +------------------+
//! | Compressed data  |  deflate-compressed bincode payload
//! +------------------+
//! ```
//!
//! Breakpoints and the other debugger control flags are deliberately
//! not captured: a restored machine resumes under the debugger session
//! that loaded it.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Magic bytes identifying a save state file.
const MAGIC: &[u8; 4] = b"M43S";
/// Current save state format version.
const FORMAT_VERSION: u32 = 1;

/// Serializable machine state.
#[derive(Serialize, Deserialize)]
pub struct SaveState {
    // CPU
    pub regs: [u16; 16],
    pub running: bool,

    // Memory (64 KB data space; access flags are transient and omitted)
    pub data: Vec<u8>,

    // Clock
    pub cycles: u64,
    pub mclk_hz: u32,

    // Statistics
    pub instructions: u64,
}

/// Save state to file with header and deflate compression.
pub fn save_to_file(state: &SaveState, path: &Path) -> Result<(), String> {
    let payload = bincode::serialize(state).map_err(|e| format!("Serialize error: {}", e))?;

    let compressed = miniz_oxide::deflate::compress_to_vec(&payload, 6);

    let mut out = Vec::with_capacity(8 + compressed.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&compressed);

    std::fs::write(path, &out).map_err(|e| format!("Write error: {}", e))
}

/// Load state from file, verifying magic and version.
pub fn load_from_file(path: &Path) -> Result<SaveState, String> {
    let data = std::fs::read(path).map_err(|e| format!("Read error: {}", e))?;

    if data.len() < 8 {
        return Err("File too small".into());
    }
    if &data[0..4] != MAGIC {
        return Err("Invalid save state file (bad magic)".into());
    }
    let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if version != FORMAT_VERSION {
        return Err(format!(
            "Unsupported save state version {} (expected {})",
            version, FORMAT_VERSION
        ));
    }

    let decompressed = miniz_oxide::inflate::decompress_to_vec(&data[8..])
        .map_err(|e| format!("Decompress error: {:?}", e))?;

    bincode::deserialize(&decompressed).map_err(|e| format!("Deserialize error: {}", e))
}

/// Derive the save state path from a firmware path:
/// `blink.bin` → `blink.state`.
pub fn state_path(firmware_path: &str) -> String {
    let p = Path::new(firmware_path);
    let stem = p.file_stem().and_then(|s| s.to_str()).unwrap_or("firmware");
    let dir = p.parent().unwrap_or(Path::new("."));
    dir.join(format!("{}.state", stem)).to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> SaveState {
        let mut regs = [0u16; 16];
        regs[0] = 0xC010;
        regs[1] = 0x03FC;
        let mut data = vec![0u8; crate::memory::MEM_SIZE];
        data[0x0200] = 0xAB;
        SaveState {
            regs,
            running: false,
            data,
            cycles: 1234,
            mclk_hz: 1_000_000,
            instructions: 300,
        }
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.state");
        save_to_file(&sample_state(), &path).unwrap();
        let loaded = load_from_file(&path).unwrap();
        assert_eq!(loaded.regs[0], 0xC010);
        assert_eq!(loaded.data[0x0200], 0xAB);
        assert_eq!(loaded.cycles, 1234);
        assert_eq!(loaded.instructions, 300);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.state");
        std::fs::write(&path, b"XXXX\x01\x00\x00\x00junk").unwrap();
        assert!(load_from_file(&path).is_err());
    }

    #[test]
    fn test_state_path() {
        assert_eq!(state_path("demos/blink.bin"), "demos/blink.state");
        assert_eq!(state_path("blink.hex"), "blink.state");
    }
}
