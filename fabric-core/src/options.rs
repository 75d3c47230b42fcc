//! Option sets consumed by controller operations.
//!
//! An [`Options`] value is assembled from an ordered list of [`Opt`]
//! adjustments. Each adjustment sets exactly one field and later adjustments
//! win for the same field. Nothing is validated here; the operation consuming
//! the options decides which fields it requires.

/// A single adjustment applied when building [`Options`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opt {
    Namespace(String),
    Vm(String),
    /// Virtual CPU count
    Cpu(u32),
    /// Memory size in MB
    Memory(u64),
    /// Disk image path
    Disk(String),
    /// Files to inject into the disk (`src:dst` pairs as the fabric expects them)
    Injects(Vec<String>),
    /// Target partition for injected files
    InjectPartition(u32),
    /// Zero-based interface index
    Interface(usize),
    /// VLAN to connect an interface to
    Vlan(String),
    /// Output path for a packet capture
    CaptureFile(String),
}

/// Immutable option set for one controller call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    namespace: Option<String>,
    vm: Option<String>,
    cpu: Option<u32>,
    memory: Option<u64>,
    disk: Option<String>,
    injects: Vec<String>,
    inject_partition: Option<u32>,
    interface: Option<usize>,
    vlan: Option<String>,
    capture_file: Option<String>,
}

impl Options {
    /// Build an option set by applying `opts` in order.
    pub fn new(opts: impl IntoIterator<Item = Opt>) -> Self {
        let mut options = Self::default();
        for opt in opts {
            options.apply(opt);
        }
        options
    }

    fn apply(&mut self, opt: Opt) {
        match opt {
            Opt::Namespace(ns) => self.namespace = Some(ns),
            Opt::Vm(vm) => self.vm = Some(vm),
            Opt::Cpu(cpu) => self.cpu = Some(cpu),
            Opt::Memory(mem) => self.memory = Some(mem),
            Opt::Disk(disk) => self.disk = Some(disk),
            Opt::Injects(injects) => self.injects = injects,
            Opt::InjectPartition(part) => self.inject_partition = Some(part),
            Opt::Interface(idx) => self.interface = Some(idx),
            Opt::Vlan(vlan) => self.vlan = Some(vlan),
            Opt::CaptureFile(path) => self.capture_file = Some(path),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        non_empty(&self.namespace)
    }

    pub fn vm(&self) -> Option<&str> {
        non_empty(&self.vm)
    }

    /// CPU override; a zero count counts as not supplied.
    pub fn cpu(&self) -> Option<u32> {
        self.cpu.filter(|&cpu| cpu != 0)
    }

    /// Memory override in MB; zero counts as not supplied.
    pub fn memory(&self) -> Option<u64> {
        self.memory.filter(|&mem| mem != 0)
    }

    pub fn disk(&self) -> Option<&str> {
        non_empty(&self.disk)
    }

    pub fn injects(&self) -> &[String] {
        &self.injects
    }

    pub fn inject_partition(&self) -> u32 {
        self.inject_partition.unwrap_or(0)
    }

    pub fn interface(&self) -> usize {
        self.interface.unwrap_or(0)
    }

    pub fn vlan(&self) -> Option<&str> {
        non_empty(&self.vlan)
    }

    pub fn capture_file(&self) -> Option<&str> {
        non_empty(&self.capture_file)
    }
}

impl FromIterator<Opt> for Options {
    fn from_iter<I: IntoIterator<Item = Opt>>(iter: I) -> Self {
        Self::new(iter)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
