//! User and device lifecycle.
//!
//! Users own devices and devices own pool addresses. Every operation
//! here keeps the three in step inside the caller's write transaction:
//! an address is never bound without a device, a device never exists
//! without appearing in its owner's set.

use secrecy::{ExposeSecret, SecretString};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::info;

use crate::command::{
    CreateDeviceRequest, CreateUserRequest, UpdateDeviceRequest, UpdateUserRequest,
};
use crate::error::CoreError;
use crate::model::{Device, GeneratedKey, User, UserId, validate_label};
use crate::otp::{IssuedSecret, SecretIssuer};
use crate::pool::AddressPool;
use crate::store::{Bucket, Snapshot, SnapshotExt, WriteTx};

type Result<T> = std::result::Result<T, CoreError>;

/// A user after a mutation, plus a second-factor secret if one was just
/// issued. The secret is never readable again.
#[derive(Debug)]
pub struct UserChange {
    pub user: User,
    pub issued: Option<IssuedSecret>,
}

/// A device after creation, plus its private key when the key was
/// generated here.
pub struct DeviceProvision {
    pub device: Device,
    pub private_key: Option<SecretString>,
}

impl std::fmt::Debug for DeviceProvision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceProvision")
            .field("device", &self.device)
            .field("private_key", &self.private_key.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

#[derive(Clone)]
pub struct Registry {
    pool: AddressPool,
    issuer: Arc<dyn SecretIssuer>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl Registry {
    pub fn new(pool: AddressPool, issuer: Arc<dyn SecretIssuer>) -> Self {
        Self { pool, issuer }
    }

    pub fn pool(&self) -> &AddressPool {
        &self.pool
    }

    // ── Records ──────────────────────────────────────────────────────

    pub fn user_record(tx: &dyn Snapshot, id: UserId) -> Result<User> {
        tx.get_json(Bucket::Users, id.as_bytes())?
            .ok_or_else(|| CoreError::not_found("user", id))
    }

    pub fn device_record(tx: &dyn Snapshot, address: Ipv4Addr) -> Result<Device> {
        tx.get_json(Bucket::Devices, &address.octets())?
            .ok_or_else(|| CoreError::not_found("device", address))
    }

    pub fn users(tx: &dyn Snapshot) -> Result<Vec<User>> {
        let mut users: Vec<User> = tx.scan_json(Bucket::Users)?;
        users.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(users)
    }

    /// All devices in address order.
    pub fn devices(tx: &dyn Snapshot) -> Result<Vec<Device>> {
        tx.scan_json(Bucket::Devices)
    }

    pub(crate) fn save_user(tx: &WriteTx, user: &User) -> Result<()> {
        tx.put_json(Bucket::Users, user.id.as_bytes(), user)
    }

    fn save_device(tx: &WriteTx, device: &Device) -> Result<()> {
        tx.put_json(Bucket::Devices, &device.address().octets(), device)
    }

    // ── Users ────────────────────────────────────────────────────────

    pub fn create_user(&self, tx: &WriteTx, request: &CreateUserRequest) -> Result<UserChange> {
        validate_label("name", &request.name)?;

        let mut user = User::new(request.name.trim());
        let issued = if request.is_manager {
            Some(self.promote(&mut user)?)
        } else {
            None
        };

        Self::save_user(tx, &user)?;
        info!(user = %user.id, manager = user.is_manager, "user created");
        Ok(UserChange { user, issued })
    }

    pub fn update_user(
        &self,
        tx: &WriteTx,
        id: UserId,
        request: &UpdateUserRequest,
    ) -> Result<UserChange> {
        let mut user = Self::user_record(tx, id)?;

        if let Some(name) = &request.name {
            validate_label("name", name)?;
            name.trim().clone_into(&mut user.name);
        }

        let issued = match request.is_manager {
            Some(true) if !user.is_manager => Some(self.promote(&mut user)?),
            Some(false) if user.is_manager => {
                user.revoke_manager();
                None
            }
            _ => None,
        };

        Self::save_user(tx, &user)?;
        info!(user = %user.id, manager = user.is_manager, "user updated");
        Ok(UserChange { user, issued })
    }

    fn promote(&self, user: &mut User) -> Result<IssuedSecret> {
        let issued = self.issuer.issue(&user.name)?;
        user.is_manager = true;
        user.tfa_secret = Some(issued.secret.expose_secret().to_owned());
        Ok(issued)
    }

    /// Deletes a user together with every device they own.
    pub fn remove_user(&self, tx: &WriteTx, id: UserId) -> Result<User> {
        let user = Self::user_record(tx, id)?;
        for address in &user.devices {
            self.pool.release(tx, *address)?;
            tx.delete(Bucket::Devices, &address.octets())?;
        }
        tx.delete(Bucket::Users, id.as_bytes())?;
        info!(user = %id, devices = user.devices.len(), "user removed");
        Ok(user)
    }

    // ── Devices ──────────────────────────────────────────────────────

    pub fn create_device(
        &self,
        tx: &WriteTx,
        request: &CreateDeviceRequest,
    ) -> Result<DeviceProvision> {
        validate_label("label", &request.label)?;
        let mut owner = Self::user_record(tx, request.owner)?;

        let (public_key, private_key) = match request.public_key {
            Some(key) => (key, None),
            None => {
                let generated = GeneratedKey::generate();
                (generated.public, Some(generated.private))
            }
        };

        let inet = self.pool.allocate(tx, &public_key)?;
        let device = Device {
            inet,
            public_key,
            label: request.label.trim().to_owned(),
            wan_forward: request.wan_forward,
            owner: owner.id,
        };
        Self::save_device(tx, &device)?;

        owner.devices.insert(device.address());
        Self::save_user(tx, &owner)?;

        info!(address = %device.address(), owner = %owner.id, "device created");
        Ok(DeviceProvision {
            device,
            private_key,
        })
    }

    pub fn update_device(
        &self,
        tx: &WriteTx,
        address: Ipv4Addr,
        request: &UpdateDeviceRequest,
    ) -> Result<Device> {
        let mut device = Self::device_record(tx, address)?;

        if let Some(label) = &request.label {
            validate_label("label", label)?;
            label.trim().clone_into(&mut device.label);
        }
        if let Some(wan_forward) = request.wan_forward {
            device.wan_forward = wan_forward;
        }
        if let Some(key) = request.public_key.filter(|key| *key != device.public_key) {
            self.pool.rebind(tx, address, &key)?;
            device.public_key = key;
        }
        if let Some(new_owner) = request.owner.filter(|owner| *owner != device.owner) {
            let mut next = Self::user_record(tx, new_owner)?;
            let previous = tx.get_json::<User>(Bucket::Users, device.owner.as_bytes())?;
            if let Some(mut previous) = previous {
                previous.devices.remove(&address);
                Self::save_user(tx, &previous)?;
            }
            next.devices.insert(address);
            Self::save_user(tx, &next)?;
            device.owner = new_owner;
        }

        Self::save_device(tx, &device)?;
        info!(%address, "device updated");
        Ok(device)
    }

    /// Deletes a device, frees its address and detaches it from its owner.
    pub fn remove_device(&self, tx: &WriteTx, address: Ipv4Addr) -> Result<Device> {
        let device = Self::device_record(tx, address)?;

        self.pool.release(tx, address)?;
        tx.delete(Bucket::Devices, &address.octets())?;
        if let Some(mut owner) = tx.get_json::<User>(Bucket::Users, device.owner.as_bytes())? {
            owner.devices.remove(&address);
            Self::save_user(tx, &owner)?;
        }

        info!(%address, owner = %device.owner, "device removed");
        Ok(device)
    }
}
