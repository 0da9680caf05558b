use std::env;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
static TEMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn env_lock() -> MutexGuard<'static, ()> {
    match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
        Ok(g) => g,
        // A test that panicked while holding the lock must not wedge the rest.
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Fresh, empty directory under the system temp dir, unique per call.
#[allow(dead_code)]
pub fn unique_test_temp_dir(label: &str) -> PathBuf {
    let n = TEMP_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = env::temp_dir().join(format!(
        "swarm-test-{label}-{}-{n}-{:08x}",
        std::process::id(),
        rand::random::<u32>()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("create unique test temp dir");
    dir
}

/// RAII guard for test-only env var mutation.
///
/// Mutations through this guard are serialized with a global lock; the
/// previous value is restored on drop.
#[must_use]
#[allow(dead_code)]
pub struct EnvVarGuard {
    entries: Vec<(String, Option<OsString>)>,
    _lock: MutexGuard<'static, ()>,
}

#[allow(dead_code)]
impl EnvVarGuard {
    pub fn set<K: Into<String>, V: AsRef<OsStr>>(key: K, value: V) -> Self {
        let key: String = key.into();
        Self::set_many(&[(key.as_str(), value.as_ref())])
    }

    pub fn unset<K: Into<String>>(key: K) -> Self {
        let key = key.into();
        let lock = env_lock();
        let old = env::var_os(&key);
        env::remove_var(&key);
        Self {
            entries: vec![(key, old)],
            _lock: lock,
        }
    }

    pub fn set_many(pairs: &[(&str, &OsStr)]) -> Self {
        let lock = env_lock();
        let mut entries = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let key = (*key).to_string();
            let old = env::var_os(&key);
            env::set_var(&key, value);
            entries.push((key, old));
        }
        Self {
            entries,
            _lock: lock,
        }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        for (key, old) in self.entries.iter().rev() {
            match old {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}
