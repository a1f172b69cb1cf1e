//! Device lifecycle - registration with the host
//!
//! Installing a device takes three steps, in order: allocate a major number,
//! create the device class, create the device node. If a step fails, the
//! completed ones are undone in reverse order. Uninstalling undoes all three
//! exactly once.
//!
//! [`Host`] is the seam to whatever actually owns device numbers and nodes.
//! [`MemoryHost`] keeps that bookkeeping in process.

use crate::device::CharDevice;
use crate::error::{CharDevError, Result};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

/// First major number handed out by [`MemoryHost`]
pub const FIRST_DYNAMIC_MAJOR: u32 = 240;

/// Major/minor pair identifying a device node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceNumber {
    pub major: u32,
    pub minor: u32,
}

impl fmt::Display for DeviceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major, self.minor)
    }
}

/// Registration services provided by the host
pub trait Host {
    /// Allocate a major number for `name`
    fn register_chrdev(&self, name: &str) -> Result<u32>;

    fn unregister_chrdev(&self, major: u32, name: &str) -> Result<()>;

    fn create_class(&self, name: &str) -> Result<()>;

    fn destroy_class(&self, name: &str) -> Result<()>;

    fn create_device(&self, class: &str, number: DeviceNumber, name: &str) -> Result<()>;

    fn destroy_device(&self, class: &str, number: DeviceNumber) -> Result<()>;
}

/// Step at which [`MemoryHost`] can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    RegisterNumber,
    CreateClass,
    CreateDevice,
}

#[derive(Default)]
struct HostState {
    next_major: u32,
    chrdevs: HashMap<u32, String>,
    classes: HashSet<String>,
    nodes: HashMap<DeviceNumber, (String, String)>,
    fail: Option<FailPoint>,
}

impl HostState {
    fn trip(&mut self, point: FailPoint) -> bool {
        if self.fail == Some(point) {
            self.fail = None;
            true
        } else {
            false
        }
    }
}

/// In-process host keeping device bookkeeping in memory
pub struct MemoryHost {
    state: Mutex<HostState>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HostState {
                next_major: FIRST_DYNAMIC_MAJOR,
                ..HostState::default()
            }),
        }
    }

    /// Make the next attempt at `point` fail once
    pub fn fail_next(&self, point: FailPoint) {
        self.state.lock().fail = Some(point);
    }

    pub fn is_registered(&self, major: u32) -> bool {
        self.state.lock().chrdevs.contains_key(&major)
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.state.lock().classes.contains(name)
    }

    /// Name of the node at `number`, if one exists
    pub fn node(&self, number: DeviceNumber) -> Option<String> {
        self.state
            .lock()
            .nodes
            .get(&number)
            .map(|(_, name)| name.clone())
    }

    /// True when nothing at all is registered
    pub fn is_clean(&self) -> bool {
        let state = self.state.lock();
        state.chrdevs.is_empty() && state.classes.is_empty() && state.nodes.is_empty()
    }
}

impl Host for MemoryHost {
    fn register_chrdev(&self, name: &str) -> Result<u32> {
        let mut state = self.state.lock();
        if state.trip(FailPoint::RegisterNumber) {
            return Err(CharDevError::RegisterNumber {
                name: name.to_string(),
                reason: "no free major numbers".to_string(),
            });
        }
        if state.chrdevs.values().any(|n| n == name) {
            return Err(CharDevError::RegisterNumber {
                name: name.to_string(),
                reason: "name already registered".to_string(),
            });
        }

        let major = state.next_major;
        state.next_major += 1;
        state.chrdevs.insert(major, name.to_string());
        Ok(major)
    }

    fn unregister_chrdev(&self, major: u32, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        match state.chrdevs.get(&major) {
            Some(registered) if registered == name => {
                state.chrdevs.remove(&major);
                Ok(())
            }
            _ => Err(CharDevError::NotRegistered(format!("{} (major {})", name, major))),
        }
    }

    fn create_class(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        if state.trip(FailPoint::CreateClass) {
            return Err(CharDevError::RegisterClass {
                name: name.to_string(),
                reason: "class creation refused".to_string(),
            });
        }
        if !state.classes.insert(name.to_string()) {
            return Err(CharDevError::RegisterClass {
                name: name.to_string(),
                reason: "class already exists".to_string(),
            });
        }
        Ok(())
    }

    fn destroy_class(&self, name: &str) -> Result<()> {
        if self.state.lock().classes.remove(name) {
            Ok(())
        } else {
            Err(CharDevError::NotRegistered(name.to_string()))
        }
    }

    fn create_device(&self, class: &str, number: DeviceNumber, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        if state.trip(FailPoint::CreateDevice) {
            return Err(CharDevError::CreateDevice {
                name: name.to_string(),
                reason: "node creation refused".to_string(),
            });
        }
        if !state.classes.contains(class) {
            return Err(CharDevError::CreateDevice {
                name: name.to_string(),
                reason: format!("unknown class '{}'", class),
            });
        }
        if state.nodes.contains_key(&number) {
            return Err(CharDevError::CreateDevice {
                name: name.to_string(),
                reason: format!("node {} already exists", number),
            });
        }
        state
            .nodes
            .insert(number, (class.to_string(), name.to_string()));
        Ok(())
    }

    fn destroy_device(&self, class: &str, number: DeviceNumber) -> Result<()> {
        let mut state = self.state.lock();
        match state.nodes.get(&number) {
            Some((registered, _)) if registered == class => {
                state.nodes.remove(&number);
                Ok(())
            }
            _ => Err(CharDevError::NotRegistered(format!("node {}", number))),
        }
    }
}

/// A device installed on a host
///
/// Dropping the registration uninstalls the device.
pub struct Registration<'h, H: Host + ?Sized> {
    host: &'h H,
    device: Arc<CharDevice>,
    number: DeviceNumber,
    installed: bool,
}

impl<'h, H: Host + ?Sized> Registration<'h, H> {
    /// Register `device` with `host`, rolling back on failure
    pub fn install(host: &'h H, device: Arc<CharDevice>) -> Result<Self> {
        let name = device.name();
        let class = device.class();
        info!(device = name, "installing device");

        let major = host.register_chrdev(name).map_err(|e| {
            error!(device = name, error = %e, "could not register major number");
            e
        })?;
        info!(device = name, major, "registered correctly with major number {}", major);

        if let Err(e) = host.create_class(class) {
            error!(device = name, class, error = %e, "failed to register device class");
            let _ = host.unregister_chrdev(major, name);
            return Err(e);
        }
        info!(device = name, class, "device class registered correctly");

        let number = DeviceNumber { major, minor: 0 };
        if let Err(e) = host.create_device(class, number, name) {
            error!(device = name, %number, error = %e, "failed to create the device");
            let _ = host.destroy_class(class);
            let _ = host.unregister_chrdev(major, name);
            return Err(e);
        }
        info!(device = name, %number, "device created correctly");

        Ok(Self {
            host,
            device,
            number,
            installed: true,
        })
    }

    pub fn number(&self) -> DeviceNumber {
        self.number
    }

    pub fn device(&self) -> &Arc<CharDevice> {
        &self.device
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Tear the device down; reports the first teardown error
    pub fn uninstall(mut self) -> Result<()> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<()> {
        if !self.installed {
            return Ok(());
        }
        self.installed = false;

        let name = self.device.name();
        let class = self.device.class();
        info!(device = name, "removing device");

        // Attempt every step even if an earlier one fails
        let results = [
            self.host.destroy_device(class, self.number),
            self.host.destroy_class(class),
            self.host.unregister_chrdev(self.number.major, name),
        ];
        let outcome = results.into_iter().collect::<Result<Vec<()>>>().map(|_| ());

        match &outcome {
            Ok(()) => info!(device = name, "device removed"),
            Err(e) => error!(device = name, error = %e, "device teardown incomplete"),
        }
        outcome
    }
}

impl<H: Host + ?Sized> Drop for Registration<'_, H> {
    fn drop(&mut self) {
        let _ = self.teardown();
    }
}

impl<H: Host + ?Sized> fmt::Debug for Registration<'_, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("device", &self.device.name())
            .field("number", &self.number)
            .field("installed", &self.installed)
            .finish()
    }
}
