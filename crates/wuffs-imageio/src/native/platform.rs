use std::fmt;
use std::sync::OnceLock;

pub const BASE_NAME: &str = "wuffs_imageio";
pub const ACCEL_SUFFIX: &str = "_avx2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    MacOs,
    Linux,
    Win32,
}

impl Os {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Os::MacOs => "macos",
            Os::Linux => "linux",
            Os::Win32 => "win32",
        }
    }

    #[inline]
    fn library_file(self, stem: &str) -> String {
        match self {
            Os::Win32 => format!("{stem}.dll"),
            Os::MacOs => format!("lib{stem}.dylib"),
            Os::Linux => format!("lib{stem}.so"),
        }
    }

    /// Case-insensitive substring classification of an OS name.
    pub fn classify(os_name: &str) -> Option<Os> {
        let n = os_name.to_ascii_lowercase();
        // "darwin" contains "win", so mac must be checked first.
        if n.contains("mac") || n.contains("darwin") {
            Some(Os::MacOs)
        } else if n.contains("win") {
            Some(Os::Win32)
        } else if n.contains("linux") {
            Some(Os::Linux)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    Arm64,
    X86_64,
}

impl Arch {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Arch::Arm64 => "arm64",
            Arch::X86_64 => "x86_64",
        }
    }

    pub fn classify(arch_name: &str) -> Option<Arch> {
        match arch_name.trim().to_ascii_lowercase().as_str() {
            "aarch64" | "arm64" => Some(Arch::Arm64),
            "x86_64" | "amd64" | "x64" => Some(Arch::X86_64),
            _ => None,
        }
    }
}

/// Result of resolving (OS, arch) against the supported native matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformDescriptor {
    pub os: String,
    pub arch: String,
    pub supported: bool,
    pub platform_id: Option<String>,
    pub baseline_library_file: Option<String>,
    pub accel_library_file: Option<String>,
}

impl PlatformDescriptor {
    fn unsupported(os: &str, arch: &str) -> Self {
        Self {
            os: os.to_owned(),
            arch: arch.to_owned(),
            supported: false,
            platform_id: None,
            baseline_library_file: None,
            accel_library_file: None,
        }
    }

    /// Resolves raw OS/arch names (e.g. `std::env::consts`) into a descriptor.
    pub fn resolve(os_name: &str, arch_name: &str) -> Self {
        let raw_os = os_name.to_ascii_lowercase();
        let raw_arch = arch_name.to_ascii_lowercase();

        let Some(os) = Os::classify(&raw_os) else {
            return Self::unsupported(&raw_os, &raw_arch);
        };
        let Some(arch) = Arch::classify(&raw_arch) else {
            return Self::unsupported(os.as_str(), &raw_arch);
        };

        let platform_id = match (os, arch) {
            (Os::MacOs, Arch::Arm64) => "arm64-macos",
            (Os::MacOs, Arch::X86_64) => "x86_64-macos",
            (Os::Linux, Arch::X86_64) => "x86_64-linux",
            (Os::Win32, Arch::X86_64) => "x86_64-win32",
            _ => return Self::unsupported(os.as_str(), arch.as_str()),
        };

        let accel = match arch {
            Arch::X86_64 => Some(os.library_file(&format!("{BASE_NAME}{ACCEL_SUFFIX}"))),
            Arch::Arm64 => None,
        };

        Self {
            os: os.as_str().to_owned(),
            arch: arch.as_str().to_owned(),
            supported: true,
            platform_id: Some(platform_id.to_owned()),
            baseline_library_file: Some(os.library_file(BASE_NAME)),
            accel_library_file: accel,
        }
    }

    /// Descriptor of the running process, computed once.
    pub fn current() -> &'static PlatformDescriptor {
        static CURRENT: OnceLock<PlatformDescriptor> = OnceLock::new();
        CURRENT.get_or_init(|| {
            Self::resolve(std::env::consts::OS, std::env::consts::ARCH)
        })
    }

    /// `platform_id` when known, otherwise "<os> <arch>".
    pub fn label(&self) -> String {
        match &self.platform_id {
            Some(id) => id.clone(),
            None => format!("{} {}", self.os, self.arch),
        }
    }

    /// Resource key of the baseline binary, `None` when unsupported.
    pub fn baseline_resource(&self) -> Option<String> {
        Some(resource_key(
            self.platform_id.as_deref()?,
            self.baseline_library_file.as_deref()?,
        ))
    }

    pub fn accel_resource(&self) -> Option<String> {
        Some(resource_key(
            self.platform_id.as_deref()?,
            self.accel_library_file.as_deref()?,
        ))
    }
}

impl fmt::Display for PlatformDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[inline]
pub fn resource_key(platform_id: &str, file: &str) -> String {
    format!("natives/{platform_id}/{file}")
}
