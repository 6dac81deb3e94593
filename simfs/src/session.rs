use crate::config::Config;
use crate::error::{Result, SimFsError};
use crate::fs::SimFs;
use crate::node::NodeId;

use log::{error, info};

/// Owns at most one live filesystem and enforces its lifecycle: a filesystem
/// must be torn down before another can be initialized, and nothing can be
/// done with a session that has not been initialized.
#[derive(Default)]
pub struct Session {
    fs: Option<SimFs>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Formats a filesystem of `capacity` bytes split into `block_size` byte
    /// blocks.
    ///
    /// # Errors
    ///
    /// `AlreadyInitialized` if a filesystem is live, whatever the arguments,
    /// otherwise `InvalidConfig` for a bad geometry.
    pub fn init(&mut self, block_size: u64, capacity: u64) -> Result<&mut SimFs> {
        self.ensure_idle()?;
        self.init_with(Config::new(block_size, capacity)?)
    }

    /// # Errors
    ///
    /// `AlreadyInitialized` if a filesystem is live; the live filesystem is
    /// left as it was.
    pub fn init_with(&mut self, config: Config) -> Result<&mut SimFs> {
        self.ensure_idle()?;
        Ok(self.fs.get_or_insert(SimFs::new(config)))
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.fs.is_some() {
            error!("refusing to initialize over a live filesystem");
            return Err(SimFsError::AlreadyInitialized);
        }
        Ok(())
    }

    /// Destroys the live filesystem, returning how many nodes it held.
    pub fn teardown(&mut self) -> Result<usize> {
        let fs = self.fs.take().ok_or(SimFsError::NotInitialized)?;
        let released = fs.flush();
        info!("session torn down");
        Ok(released)
    }

    pub fn is_initialized(&self) -> bool {
        self.fs.is_some()
    }

    pub fn fs(&self) -> Result<&SimFs> {
        self.fs.as_ref().ok_or(SimFsError::NotInitialized)
    }

    pub fn fs_mut(&mut self) -> Result<&mut SimFs> {
        self.fs.as_mut().ok_or(SimFsError::NotInitialized)
    }

    pub fn current_node(&self) -> Result<NodeId> {
        Ok(self.fs()?.current_node())
    }

    pub fn set_current_node(&mut self, id: NodeId) -> Result<()> {
        self.fs_mut()?.set_current_node(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_init_is_refused() {
        let mut session = Session::new();
        session.init(512, 4096).unwrap().make_dir("keep").unwrap();

        assert!(matches!(
            session.init(64, 64),
            Err(SimFsError::AlreadyInitialized)
        ));
        // The first filesystem survives the refused init.
        assert!(session.fs().unwrap().lookup("/keep").is_ok());
        assert_eq!(session.fs().unwrap().block_size(), 512);
    }

    #[test]
    fn teardown_allows_reinit() {
        let mut session = Session::new();
        session.init(32, 512).unwrap();
        assert_eq!(session.teardown().unwrap(), 1);
        assert!(!session.is_initialized());
        assert_eq!(session.teardown(), Err(SimFsError::NotInitialized));

        let fs = session.init(64, 512).unwrap();
        assert_eq!(fs.num_blocks(), 8);
    }

    #[test]
    fn uninitialized_session_rejects_use() {
        let mut session = Session::new();
        assert!(session.fs().is_err());
        assert_eq!(session.current_node(), Err(SimFsError::NotInitialized));
        assert!(session.fs_mut().is_err());
    }

    #[test]
    fn bad_config_leaves_session_uninitialized() {
        let mut session = Session::new();
        assert!(matches!(
            session.init(0, 512),
            Err(SimFsError::InvalidConfig(_))
        ));
        assert!(!session.is_initialized());
    }

    #[test]
    fn live_session_reports_double_init_before_bad_config() {
        let mut session = Session::new();
        session.init(32, 512).unwrap();
        assert!(matches!(
            session.init(0, 512),
            Err(SimFsError::AlreadyInitialized)
        ));
        assert_eq!(session.fs().unwrap().num_blocks(), 16);
    }

    #[test]
    fn working_node_moves_through_session() {
        let mut session = Session::new();
        let dir = session.init(32, 512).unwrap().make_dir("d").unwrap();
        session.set_current_node(dir).unwrap();
        assert_eq!(session.current_node().unwrap(), dir);
    }
}
