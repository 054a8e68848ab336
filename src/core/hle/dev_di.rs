use std::process::exit;
use tracing::{error, info};

use crate::core::hle::IOS_OK;
use crate::core::memory::Memory;

const IOCTL_DVD_LOW_GET_COVER_REGISTER: u32 = 0x7A;

fn dvd_low_get_cover_register(
    mem: &mut Memory,
    addr0: u32,
    size0: u32,
    _addr1: u32,
    _size1: u32,
) -> u32 {
    assert!(size0 >= 4);

    info!("DI DvdLowGetCoverRegister (addr: {:08X}, size: {})", addr0, size0);

    // No disc activity to report; the whole response buffer reads back zero.
    mem.get_slice_mut(addr0, size0 as usize).unwrap().fill(0);

    IOS_OK
}

pub fn ioctl(mem: &mut Memory, ioctl: u32, addr0: u32, size0: u32, addr1: u32, size1: u32) -> u32 {
    match ioctl {
        IOCTL_DVD_LOW_GET_COVER_REGISTER => {
            dvd_low_get_cover_register(mem, addr0, size0, addr1, size1)
        }
        _ => {
            error!("DI Unimplemented ioctl {:08X}", ioctl);
            exit(1);
        }
    }
}
