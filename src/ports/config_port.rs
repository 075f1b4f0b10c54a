//! Configuration access port trait.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    /// All keys present in `section`, in no particular order.
    fn keys(&self, section: &str) -> Vec<String>;
}
