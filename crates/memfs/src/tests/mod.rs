mod encryption;
mod handles;

use crate::MemFs;

/// Every path under `root` with the stored bytes of files, in walk order.
pub(crate) fn collect(fs: &MemFs) -> Vec<(String, Option<Vec<u8>>)> {
    let mut out = Vec::new();
    fs.walk(".", |path, entry| {
        let content = if entry.is_dir() {
            None
        } else {
            Some(fs.read_stored(path)?)
        };
        out.push((path.to_string(), content));
        Ok(())
    })
    .unwrap();
    out
}
