use once_cell::unsync::OnceCell;

use crate::error::ContextError;

type LoadFunction<T> = Box<dyn Fn() -> Result<T, ContextError>>;

/// A lazily loaded resource, such as a typeface, which is fetched the first time it is
/// needed and then kept for the rest of the session.
///
/// The loader is owned by whoever needs the resource (usually the `Exporter`) rather than
/// living in a global, so a test can `reset` it and observe a fresh load.
pub struct ResourceLoader<T> {
    name: String,
    load_function: LoadFunction<T>,
    resource: OnceCell<T>,
}

impl<T> ResourceLoader<T> {
    /// Creates a loader which will call `load_function` on the first `load`.
    pub fn new<S, F>(name: S, load_function: F) -> Self
    where
        S: Into<String>,
        F: Fn() -> Result<T, ContextError> + 'static,
    {
        ResourceLoader {
            name: name.into(),
            load_function: Box::new(load_function),
            resource: OnceCell::new(),
        }
    }

    /// Returns the resource, loading it if this is the first call since creation or reset.
    /// A failed load is not cached, the next call tries again.
    pub fn load(&self) -> Result<&T, ContextError> {
        self.resource.get_or_try_init(|| {
            log::debug!("Loading the resource {:?}", self.name);
            (self.load_function)().map_err(|error| {
                ContextError::with_error(
                    format!("Unable to load the resource {:?}", self.name),
                    &error,
                )
            })
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.resource.get().is_some()
    }

    /// Forgets the loaded resource so that the next `load` fetches it again.
    pub fn reset(&mut self) {
        self.resource.take();
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
