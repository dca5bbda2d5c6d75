#[cfg(not(all(target_arch = "arm", target_os = "none")))]
mod std_items {
    pub use std::fmt::Debug;
}

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
pub use std_items::*;

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod no_std_items {
    pub use core::fmt::Debug;
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub use no_std_items::*;

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        #[cfg(not(all(target_arch = "arm", target_os = "none")))]
        {
            log::info!("[node] {}", core::format_args!($($arg)*));
        }
        #[cfg(all(target_arch = "arm", target_os = "none"))]
        {
            defmt::info!("[node] {}", defmt::Debug2Format(&core::format_args!($($arg)*)));
        }
    };
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        #[cfg(not(all(target_arch = "arm", target_os = "none")))]
        {
            log::debug!("[node] {}", core::format_args!($($arg)*));
        }
        #[cfg(all(target_arch = "arm", target_os = "none"))]
        {
            defmt::debug!("[node] {}", defmt::Debug2Format(&core::format_args!($($arg)*)));
        }
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        #[cfg(not(all(target_arch = "arm", target_os = "none")))]
        {
            log::warn!("[node] {}", core::format_args!($($arg)*));
        }
        #[cfg(all(target_arch = "arm", target_os = "none"))]
        {
            defmt::warn!("[node] {}", defmt::Debug2Format(&core::format_args!($($arg)*)));
        }
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        #[cfg(not(all(target_arch = "arm", target_os = "none")))]
        {
            log::error!("[node] {}", core::format_args!($($arg)*));
        }
        #[cfg(all(target_arch = "arm", target_os = "none"))]
        {
            defmt::error!("[node] {}", defmt::Debug2Format(&core::format_args!($($arg)*)));
        }
    };
}
