use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::process::exit;

use tracing::{error, info, warn};

use crate::core::memory::Memory;
use crate::core::scheduler::{EventKind, Scheduler};

pub mod dev_di;
pub mod es;
pub mod fs;

pub const IOS_OK: u32 = 0;

/// Guest-visible "no such file" for host-backed opens.
const IOS_ENOENT: i32 = -106;

const NUM_FDS: usize = 128;
const NUM_ARGS: usize = 5;

/// Cycles between command pickup, acknowledge and completion.
pub const NUM_TASK_CYCLES: i64 = 4096;

const COMMAND_OPEN: u32 = 1;
const COMMAND_CLOSE: u32 = 2;
const COMMAND_READ: u32 = 3;
const COMMAND_WRITE: u32 = 4;
const COMMAND_SEEK: u32 = 5;
const COMMAND_IOCTL: u32 = 6;
const COMMAND_IOCTLV: u32 = 7;
const COMMAND_REPLY: u32 = 8;

const SEEK_SET: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceClass {
    Di,
    Es,
    Fs,
    Net,
    Stm,
    Host,
}

struct FdEntry {
    opened: bool,
    name: String,
    file: Option<File>,
    class: DeviceClass,
}

/// 8-word IPC command packet: cmd, retval, fd, five args.
struct Packet {
    raw: [u32; 8],
}

impl Packet {
    fn fetch(mem: &Memory, ppcmsg: u32) -> Packet {
        let mut raw = [0u32; 8];
        for (i, word) in raw.iter_mut().enumerate() {
            let addr = ppcmsg + 4 * i as u32;
            let Some(data) = mem.read::<32>(addr) else {
                error!("HLE Command packet outside RAM (address: {:08X})", addr);
                exit(1);
            };
            *word = data as u32;
        }
        Packet { raw }
    }

    fn store(&self, mem: &mut Memory, ppcmsg: u32) {
        for (i, word) in self.raw.iter().enumerate() {
            mem.write::<32>(ppcmsg + 4 * i as u32, *word as u64);
        }
    }

    fn cmd(&self) -> u32 {
        self.raw[0]
    }
    fn fd(&self) -> u32 {
        self.raw[2]
    }
    fn arg(&self, n: usize) -> u32 {
        assert!(n < NUM_ARGS);
        self.raw[3 + n]
    }
    fn set_retval(&mut self, retval: i32) {
        self.raw[1] = retval as u32;
    }
}

/// High-level emulation of the service processor's resource manager: a file
/// descriptor table fronting a few virtual devices and the host filesystem.
pub struct Hle {
    fds: Vec<FdEntry>,
    next_fd: usize,
    fs_root: String,
}

impl Hle {
    pub fn new(fs_root: &str) -> Self {
        Hle {
            fds: Vec::new(),
            next_fd: 0,
            fs_root: fs_root.to_string(),
        }
    }

    pub fn reset(&mut self) {
        self.fds.clear();
        self.next_fd = 0;
    }

    /// Runs the 8-word command packet at `ppcmsg`, writes the reply back and
    /// queues the acknowledge phase. `cycles_to_run` is the CPU budget left in
    /// the current slice (the scheduler measures deadlines from its end).
    pub fn execute(
        &mut self,
        ppcmsg: u32,
        mem: &mut Memory,
        scheduler: &mut Scheduler,
        cycles_to_run: i64,
    ) {
        let mut packet = Packet::fetch(mem, ppcmsg);
        let cmd = packet.cmd();

        let retval = match cmd {
            COMMAND_OPEN => self.open(&packet, mem),
            COMMAND_CLOSE => self.close(&packet),
            COMMAND_READ => self.read(&packet, mem),
            COMMAND_WRITE => self.write(&packet, mem),
            COMMAND_SEEK => self.seek(&packet),
            COMMAND_IOCTL => self.ioctl(&packet, mem),
            COMMAND_IOCTLV => self.ioctlv(&packet, mem),
            _ => {
                error!("HLE Unimplemented IPC command type {}", cmd);
                exit(1);
            }
        };

        packet.set_retval(retval);
        packet.raw[0] = COMMAND_REPLY;
        packet.raw[2] = cmd;
        packet.store(mem, ppcmsg);

        scheduler.schedule(
            "IPC acknowledge",
            EventKind::IpcAcknowledge,
            0,
            NUM_TASK_CYCLES,
            cycles_to_run,
        );
    }

    pub fn relaunch(&mut self) {
        info!("HLE Relaunch IPC");
    }

    fn open(&mut self, packet: &Packet, mem: &Memory) -> i32 {
        let Some(name) = mem.read_cstring(packet.arg(0), 0x40) else {
            error!("HLE Open name outside RAM (address: {:08X})", packet.arg(0));
            exit(1);
        };
        let mode = packet.arg(1);

        info!("HLE IPC_Open (name: {}, mode: {})", name, mode);

        let (class, file) = if name == "/dev/di" {
            (DeviceClass::Di, None)
        } else if name == "/dev/es" {
            (DeviceClass::Es, None)
        } else if name == "/dev/fs" {
            (DeviceClass::Fs, None)
        } else if name.starts_with("/dev/net") {
            (DeviceClass::Net, None)
        } else if name.starts_with("/dev/stm") {
            (DeviceClass::Stm, None)
        } else {
            let path = format!("{}{}", self.fs_root, name);
            match OpenOptions::new()
                .read(mode & 1 != 0 || mode == 0)
                .write(mode & 2 != 0)
                .open(&path)
            {
                Ok(file) => (DeviceClass::Host, Some(file)),
                Err(e) => {
                    warn!("HLE Unable to open host file \"{}\" ({})", path, e);
                    return IOS_ENOENT;
                }
            }
        };

        // Descriptors allocate monotonically; Close never returns a slot.
        if self.next_fd >= NUM_FDS {
            error!("HLE Out of file descriptors (name: {})", name);
            exit(1);
        }

        let fd = self.next_fd;
        self.next_fd += 1;
        self.fds.push(FdEntry {
            opened: true,
            name,
            file,
            class,
        });

        fd as i32
    }

    fn entry_mut(&mut self, fd: u32) -> &mut FdEntry {
        let Some(entry) = self.fds.get_mut(fd as usize) else {
            error!("HLE Bad file descriptor {}", fd);
            exit(1);
        };
        if !entry.opened {
            warn!("HLE Descriptor {} ({}) used after close", fd, entry.name);
        }
        entry
    }

    fn close(&mut self, packet: &Packet) -> i32 {
        let entry = self.entry_mut(packet.fd());

        info!("HLE IPC_Close (name: {})", entry.name);

        entry.opened = false;
        entry.file = None;

        0
    }

    fn backing_file(&mut self, fd: u32) -> &mut File {
        let entry = self.entry_mut(fd);
        let name = entry.name.clone();
        match entry.file.as_mut() {
            Some(file) => file,
            None => {
                error!("HLE Descriptor {} ({}) has no backing file", fd, name);
                exit(1);
            }
        }
    }

    fn read(&mut self, packet: &Packet, mem: &mut Memory) -> i32 {
        let addr = packet.arg(0);
        let size = packet.arg(1) as usize;

        let file = self.backing_file(packet.fd());

        let mut buf = vec![0u8; size];
        let mut total = 0;
        loop {
            match file.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => {
                    total += n;
                    if total == size {
                        break;
                    }
                }
                Err(e) => {
                    error!("HLE Read failed (fd: {}, error: {})", packet.fd(), e);
                    exit(1);
                }
            }
        }

        info!("HLE IPC_Read (fd: {}, addr: {:08X}, size: {}, read: {})", packet.fd(), addr, size, total);

        let Some(out) = mem.get_slice_mut(addr, total) else {
            error!("HLE Read buffer outside RAM (address: {:08X})", addr);
            exit(1);
        };
        out.copy_from_slice(&buf[..total]);

        total as i32
    }

    fn write(&mut self, packet: &Packet, mem: &Memory) -> i32 {
        let addr = packet.arg(0);
        let size = packet.arg(1) as usize;

        let Some(buf) = mem.get_slice(addr, size) else {
            error!("HLE Write buffer outside RAM (address: {:08X})", addr);
            exit(1);
        };
        let buf = buf.to_vec();

        info!("HLE IPC_Write (fd: {}, addr: {:08X}, size: {})", packet.fd(), addr, size);

        let file = self.backing_file(packet.fd());
        if let Err(e) = file.write_all(&buf) {
            error!("HLE Write failed (fd: {}, error: {})", packet.fd(), e);
            exit(1);
        }

        size as i32
    }

    fn seek(&mut self, packet: &Packet) -> i32 {
        let offset = packet.arg(0);
        let origin = packet.arg(1);

        assert!(origin == SEEK_SET);

        info!("HLE IPC_Seek (fd: {}, offset: {})", packet.fd(), offset);

        let file = self.backing_file(packet.fd());
        if let Err(e) = file.seek(SeekFrom::Start(offset as u64)) {
            error!("HLE Seek failed (fd: {}, error: {})", packet.fd(), e);
            exit(1);
        }

        offset as i32
    }

    fn ioctl(&mut self, packet: &Packet, mem: &mut Memory) -> i32 {
        let (ioctl, addr0, size0, addr1, size1) = (
            packet.arg(0),
            packet.arg(1),
            packet.arg(2),
            packet.arg(3),
            packet.arg(4),
        );

        let entry = self.entry_mut(packet.fd());
        match entry.class {
            DeviceClass::Di => dev_di::ioctl(mem, ioctl, addr0, size0, addr1, size1) as i32,
            DeviceClass::Fs => fs::ioctl(mem, ioctl, addr0, size0, addr1, size1) as i32,
            class => {
                error!("HLE Unhandled ioctl {:08X} for {:?}", ioctl, class);
                exit(1);
            }
        }
    }

    fn ioctlv(&mut self, packet: &Packet, mem: &mut Memory) -> i32 {
        let (ioctl, num_in, num_out, vec) =
            (packet.arg(0), packet.arg(1), packet.arg(2), packet.arg(3));

        let entry = self.entry_mut(packet.fd());
        match entry.class {
            DeviceClass::Es => es::ioctlv(mem, ioctl, num_in, num_out, vec) as i32,
            class => {
                error!("HLE Unhandled ioctlv {:08X} for {:?}", ioctl, class);
                exit(1);
            }
        }
    }
}
