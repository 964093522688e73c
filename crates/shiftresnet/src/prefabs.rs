//! # Config Prefabs for Well-Known Model Configurations
//!
//! A prefab is a named, described builder for a [`Config`].
//!
//! * [`StaticPreFabConfig`] - a `static`-friendly prefab, built from a `fn` pointer.
//! * [`PreFabConfig`] - an owned prefab, built from a shared closure.
//! * [`StaticPreFabMap`] - a named collection of static prefabs.

use burn::config::Config;
use std::fmt::Debug;
use std::sync::Arc;

/// Static builder for a [`PreFabConfig`].
pub struct StaticPreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// Name of the model config pre-fab.
    pub name: &'static str,

    /// Description of the model config pre-fab.
    pub description: &'static str,

    /// Builder function for the config.
    pub builder: fn() -> C,
}

impl<C> StaticPreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// Convert to a [`PreFabConfig<C>`].
    pub fn to_prefab(&self) -> PreFabConfig<C> {
        PreFabConfig {
            name: self.name.to_string(),
            description: self.description.to_string(),
            builder: Arc::new(self.builder),
        }
    }

    /// Build a new config.
    pub fn to_config(&self) -> C {
        (self.builder)()
    }
}

impl<C> From<&StaticPreFabConfig<C>> for PreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    fn from(config: &StaticPreFabConfig<C>) -> Self {
        config.to_prefab()
    }
}

impl<C> Debug for StaticPreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        self.to_prefab().fmt(f)
    }
}

/// A [`Config`] Well-Known Pre-Fab.
#[derive(Clone)]
pub struct PreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// Name of the model config pre-fab.
    pub name: String,

    /// Description of the model config pre-fab.
    pub description: String,

    /// Builder function for the config.
    pub builder: Arc<dyn Fn() -> C + Send + Sync>,
}

impl<C> Debug for PreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let pretty = f.alternate();

        let type_name = std::any::type_name::<C>();
        let mut handle = f.debug_struct(&format!("PreFabConfig<{type_name}>"));

        handle
            .field("name", &self.name)
            .field("description", &self.description);

        if pretty {
            handle.field("config", &self.new_config());
        }

        handle.finish()
    }
}

impl<C> PreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// Build a new config.
    pub fn new_config(&self) -> C {
        (self.builder)()
    }

    /// Wrap the builder with a config transformation.
    ///
    /// The name and description are kept.
    pub fn map_config<D, F>(
        &self,
        f: F,
    ) -> PreFabConfig<D>
    where
        D: 'static + Config + Debug + Clone,
        F: Fn(C) -> D + Send + Sync + 'static,
    {
        let builder = self.builder.clone();
        PreFabConfig {
            name: self.name.clone(),
            description: self.description.clone(),
            builder: Arc::new(move || f(builder())),
        }
    }
}

/// A named collection of [`StaticPreFabConfig`]s.
#[derive(Debug)]
pub struct StaticPreFabMap<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// Name of the collection.
    pub name: &'static str,

    /// Description of the collection.
    pub description: &'static str,

    /// The prefabs; names are unique.
    pub items: &'static [&'static StaticPreFabConfig<C>],
}

impl<C> StaticPreFabMap<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// The names of the prefabs, in registry order.
    pub fn names(&self) -> Vec<&'static str> {
        self.items.iter().map(|item| item.name).collect()
    }

    /// Lookup a prefab by name.
    pub fn lookup_prefab(
        &self,
        name: &str,
    ) -> Option<&'static StaticPreFabConfig<C>> {
        self.items.iter().find(|item| item.name == name).copied()
    }

    /// Lookup a prefab by name.
    ///
    /// # Panics
    ///
    /// If the name is not in the map.
    pub fn expect_lookup_prefab(
        &self,
        name: &str,
    ) -> &'static StaticPreFabConfig<C> {
        match self.lookup_prefab(name) {
            Some(prefab) => prefab,
            None => panic!(
                "prefab \"{}\" not found in \"{}\"; expected one of: {:?}",
                name,
                self.name,
                self.names()
            ),
        }
    }
}
