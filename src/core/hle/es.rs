use std::process::exit;
use tracing::{error, info};

use crate::core::hle::IOS_OK;
use crate::core::memory::Memory;

const TITLE_ID: u64 = 0x0000_0001_0000_0002;

const IOCTLV_GET_DATA_DIR: u32 = 0x1D;
const IOCTLV_GET_TITLE_ID: u32 = 0x20;

const DATA_DIR: &[u8] = b"/title/00000001/00000002/data";

/// Ioctlv argument vector: input pairs first, then output pairs, each pair
/// two big-endian words {address, size}.
fn ioctlv_args(mem: &Memory, vec: u32, n: u32) -> (u32, u32) {
    let addr = mem.read::<32>(vec + 8 * n).unwrap() as u32;
    let size = mem.read::<32>(vec + 8 * n + 4).unwrap() as u32;
    (addr, size)
}

fn get_data_dir(mem: &mut Memory, num_in: u32, num_out: u32, vec: u32) -> u32 {
    assert!(num_in == 1);
    assert!(num_out == 1);

    let (addr_in, size_in) = ioctlv_args(mem, vec, 0);
    let (addr_out, size_out) = ioctlv_args(mem, vec, 1);

    assert!(size_in == 8);

    let title_id = mem.read::<64>(addr_in).unwrap();

    info!(
        "ES GetDataDir (title ID: {:016X}, addr: {:08X}, size: {})",
        title_id, addr_out, size_out
    );

    assert!(title_id == TITLE_ID);

    let out = mem.get_slice_mut(addr_out, size_out as usize).unwrap();
    for (i, b) in out.iter_mut().enumerate() {
        *b = if i < DATA_DIR.len() { DATA_DIR[i] } else { 0 };
    }

    IOS_OK
}

fn get_title_id(mem: &mut Memory, num_in: u32, num_out: u32, vec: u32) -> u32 {
    assert!(num_in == 0);
    assert!(num_out == 1);

    let (addr, size) = ioctlv_args(mem, vec, 0);

    assert!(size == 8);

    info!("ES GetTitleId (addr: {:08X}, size: {})", addr, size);

    mem.write::<64>(addr, TITLE_ID);

    IOS_OK
}

pub fn ioctlv(mem: &mut Memory, ioctl: u32, num_in: u32, num_out: u32, vec: u32) -> u32 {
    match ioctl {
        IOCTLV_GET_DATA_DIR => get_data_dir(mem, num_in, num_out, vec),
        IOCTLV_GET_TITLE_ID => get_title_id(mem, num_in, num_out, vec),
        _ => {
            error!("ES Unimplemented ioctlv {:08X}", ioctl);
            exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem() -> Memory {
        let mut m = Memory::new();
        m.reset();
        m
    }

    #[test]
    fn title_id_is_written_big_endian() {
        let mut m = mem();
        // one output pair at the vector base
        m.write::<32>(0x4000, 0x5000); // address
        m.write::<32>(0x4004, 8); // size
        assert_eq!(ioctlv(&mut m, IOCTLV_GET_TITLE_ID, 0, 1, 0x4000), IOS_OK);
        assert_eq!(m.read::<64>(0x5000), Some(TITLE_ID));
        assert_eq!(m.read::<8>(0x5003), Some(0x01));
        assert_eq!(m.read::<8>(0x5007), Some(0x02));
    }

    #[test]
    fn data_dir_truncates_to_output_size() {
        let mut m = mem();
        m.write::<64>(0x5000, TITLE_ID);
        m.write::<32>(0x4000, 0x5000); // in: title id
        m.write::<32>(0x4004, 8);
        m.write::<32>(0x4008, 0x6000); // out: path
        m.write::<32>(0x400C, 16);
        assert_eq!(ioctlv(&mut m, IOCTLV_GET_DATA_DIR, 1, 1, 0x4000), IOS_OK);
        assert_eq!(m.get_slice(0x6000, 16).unwrap(), &DATA_DIR[..16]);
    }

    #[test]
    fn data_dir_pads_with_zeroes() {
        let mut m = mem();
        m.write::<64>(0x5000, TITLE_ID);
        m.write::<32>(0x4000, 0x5000);
        m.write::<32>(0x4004, 8);
        m.write::<32>(0x4008, 0x6000);
        m.write::<32>(0x400C, 0x40);
        m.write::<8>(0x6000 + 0x3F, 0xAA);
        ioctlv(&mut m, IOCTLV_GET_DATA_DIR, 1, 1, 0x4000);
        assert_eq!(m.read::<8>(0x6000 + DATA_DIR.len() as u32), Some(0));
        assert_eq!(m.read::<8>(0x6000 + 0x3F), Some(0));
    }
}
