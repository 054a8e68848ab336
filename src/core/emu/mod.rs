use tracing::info;

use crate::core::config::Config;
use crate::core::cpu::Cpu;
use crate::core::loader;
use crate::core::memory::bus::Bus;

pub const EMU_NAME: &str = "nouwii";
pub const EMU_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const EMU_BUILD_DATE_TIME: &str = build_time::build_time_local!("%Y-%m-%d %H:%M:%S");

/// State the boot ROM and IOS leave in MEM1 low memory before an executable
/// takes over: memory sizes, arena and IPC buffer pointers, versions, and the
/// init semaphore.
const BOOT_GLOBALS: &[(u32, u32)] = &[
    (0x0028, 0x0180_0000), // physical MEM1 size
    (0x002C, 0x0180_0000), // simulated MEM1 size
    (0x0030, 0x0000_0000), // MEM1 arena low
    (0x0034, 0x017F_C000), // MEM1 arena high
    (0x00F0, 0x0180_0000), // console simulated memory size
    (0x3100, 0x0400_0000), // physical MEM2 size
    (0x3104, 0x0400_0000), // simulated MEM2 size
    (0x3108, 0x9000_0800), // MEM2 arena low
    (0x310C, 0x933E_0000), // MEM2 arena high
    (0x3110, 0x933E_0000), // IPC buffer start
    (0x3114, 0x933E_8000), // IPC buffer end
    (0x3118, 0x0400_0000), // IOS-visible MEM2 size
    (0x311C, 0x9342_0000), // IOS heap start
    (0x3120, 0x9360_0000), // IOS heap end
    (0x3138, 0x0000_0011), // Hollywood version
    (0x3140, 0x0009_0204), // IOS version
    (0x3144, 0x0006_2507), // IOS build date
    (0x3148, 0x9342_0000), // IOS reserved heap start
    (0x314C, 0x9360_0000), // IOS reserved heap end
    (0x3158, 0x0000_0113), // GDDR vendor code
    (0x315C, 0x0000_0081), // boot type
    (0x3160, 0x0000_0000), // init semaphore
];

/// Owns every subsystem and drives the run loop: one scheduler slice of CPU
/// execution, then at most one fired event.
pub struct Emulator {
    cpu: Cpu,
    bus: Bus,
}

impl Emulator {
    pub fn new(config: &Config) -> Self {
        info!("Building emulator ...");

        Emulator {
            cpu: Cpu::new(),
            bus: Bus::new(&config.filesystem_root),
        }
    }

    pub fn reset(&mut self) {
        self.bus.reset();
        self.cpu.reset();

        for &(addr, value) in BOOT_GLOBALS {
            self.bus.mem.write::<32>(addr, value as u64);
        }
    }

    pub fn load(&mut self, path: &str) {
        let entry = loader::load_dol(path, &mut self.bus.mem);
        self.cpu.set_entry(entry);
    }

    /// Runs until a fatal trap terminates the process.
    pub fn run(&mut self) -> ! {
        info!("Starting emulation");

        loop {
            let event = self.bus.begin_slice();

            self.cpu.run(&mut self.bus);

            if let Some(event) = event {
                self.bus.dispatch_event(event);
            }
        }
    }
}
