use std::process::exit;
use tracing::{error, info};

use crate::core::hle::IOS_OK;
use crate::core::memory::Memory;

const IOCTL_SET_ATTR: u32 = 5;
const IOCTL_GET_ATTR: u32 = 6;

// SetAttr input: 4-byte owner, 2-byte group, 0x40-byte path, attribute bytes.
const SIZE_ATTR_BLOCK: u32 = 0x4C;
const SIZE_NAME: usize = 0x40;
const OFFSET_NAME: u32 = 6;

fn set_attr(mem: &mut Memory, addr0: u32, size0: u32, _addr1: u32, _size1: u32) -> u32 {
    assert!(size0 == SIZE_ATTR_BLOCK);

    let name = mem.read_cstring(addr0 + OFFSET_NAME, SIZE_NAME).unwrap();

    info!("FS SetAttr (name: {})", name);

    IOS_OK
}

fn get_attr(mem: &mut Memory, addr0: u32, size0: u32, addr1: u32, size1: u32) -> u32 {
    assert!(size0 == SIZE_NAME as u32);
    assert!(size1 == SIZE_ATTR_BLOCK);

    let name = mem.read_cstring(addr0, SIZE_NAME).unwrap();

    info!("FS GetAttr (name: {}, addr: {:08X}, size: {})", name, addr1, size1);

    mem.get_slice_mut(addr1, size1 as usize).unwrap().fill(0);

    // strncpy semantics: copy up to the NUL, leave the rest of the field zero
    let src = mem.get_slice(addr0, SIZE_NAME).unwrap();
    let len = src.iter().position(|&b| b == 0).unwrap_or(SIZE_NAME);
    let path = src[..len].to_vec();
    mem.get_slice_mut(addr1 + OFFSET_NAME, SIZE_NAME).unwrap()[..len].copy_from_slice(&path);

    IOS_OK
}

pub fn ioctl(mem: &mut Memory, ioctl: u32, addr0: u32, size0: u32, addr1: u32, size1: u32) -> u32 {
    match ioctl {
        IOCTL_SET_ATTR => set_attr(mem, addr0, size0, addr1, size1),
        IOCTL_GET_ATTR => get_attr(mem, addr0, size0, addr1, size1),
        _ => {
            error!("FS Unimplemented ioctl {:08X}", ioctl);
            exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_attr_copies_name_behind_header() {
        let mut m = Memory::new();
        m.reset();

        let name = b"/tmp/flag.bin\0";
        m.get_slice_mut(0x2000, name.len()).unwrap().copy_from_slice(name);
        m.get_slice_mut(0x3000, SIZE_ATTR_BLOCK as usize).unwrap().fill(0xFF);

        assert_eq!(ioctl(&mut m, IOCTL_GET_ATTR, 0x2000, 0x40, 0x3000, 0x4C), IOS_OK);

        // header zeroed, name starts at +6
        assert_eq!(m.read::<32>(0x3000), Some(0));
        assert_eq!(m.read_cstring(0x3000 + 6, 0x40).as_deref(), Some("/tmp/flag.bin"));
    }

    #[test]
    fn get_attr_does_not_copy_past_the_terminator() {
        let mut m = Memory::new();
        m.reset();

        // stale bytes after the NUL must not reach the attribute block
        m.get_slice_mut(0x2000, SIZE_NAME).unwrap().fill(0xEE);
        m.get_slice_mut(0x2000, 4).unwrap().copy_from_slice(b"/a\0\xEE");

        ioctl(&mut m, IOCTL_GET_ATTR, 0x2000, 0x40, 0x3000, 0x4C);

        assert_eq!(m.read::<16>(0x3006), Some(0x2F61)); // "/a"
        for n in 2..SIZE_NAME as u32 {
            assert_eq!(m.read::<8>(0x3006 + n), Some(0), "byte {}", n);
        }
    }
}
