// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Names and identifiers of the domains a driver has brought up.
//!
//! The registry is owned by whoever builds the domains and handed to
//! [`Gdsc::new`](crate::Gdsc::new); there is no global table. Identifiers are
//! handed out densely from zero in registration order.

use drv_gdsc_api::GdscError;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DomainId(pub u16);

pub struct Registry<const N: usize> {
    names: heapless::Vec<&'static str, N>,
}

impl<const N: usize> Registry<N> {
    pub const fn new() -> Self {
        Self {
            names: heapless::Vec::new(),
        }
    }

    /// Fails with `ConfigError` if `name` is taken or the registry is full.
    pub fn check(&self, name: &str) -> Result<(), GdscError> {
        if self.lookup(name).is_some() || self.names.len() == N {
            return Err(GdscError::ConfigError);
        }
        Ok(())
    }

    pub fn register(
        &mut self,
        name: &'static str,
    ) -> Result<DomainId, GdscError> {
        self.check(name)?;
        let id = u16::try_from(self.names.len())
            .map_err(|_| GdscError::ConfigError)?;
        self.names.push(name).map_err(|_| GdscError::ConfigError)?;
        Ok(DomainId(id))
    }

    pub fn lookup(&self, name: &str) -> Option<DomainId> {
        self.names
            .iter()
            .position(|&n| n == name)
            .map(|i| DomainId(i as u16))
    }

    pub fn name(&self, id: DomainId) -> Option<&'static str> {
        self.names.get(usize::from(id.0)).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<const N: usize> Default for Registry<N> {
    fn default() -> Self {
        Self::new()
    }
}
