use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::time::{Duration, SystemTime};

use fuser::{
    FUSE_ROOT_ID, FileAttr, FileType, Filesystem, MountOption, ReplyAttr, ReplyData,
    ReplyDirectory, ReplyEntry, ReplyOpen, Request,
};
use log::{debug, info, warn};

use crate::error::Result;
use crate::rehydrate::{Entry, MMAP_DEFAULT, Rehydrator};

// The store is immutable, so attributes never expire.
const TTL: Duration = Duration::MAX;

type OpResult<T> = std::result::Result<T, libc::c_int>;

fn wants_write(flags: i32) -> bool {
    flags & libc::O_RDWR != 0 || flags & libc::O_WRONLY != 0
}

/// Read-only FUSE view of one root.
///
/// Inodes are stateless handles into the immutable store: every entry
/// row id maps to inode `id + offset` where the offset reserves the
/// kernel root inode, which itself stands for the selected root.
pub struct SprayDryFs {
    rehydrator: Rehydrator,
    root: Entry,
    uid: u32,
    gid: u32,
    inode_offset: u64,
}

impl SprayDryFs {
    pub fn open(dbpath: &Path, rootname: &str, rootversion: &str, mmap: Option<u64>) -> Result<Self> {
        let rehydrator = Rehydrator::open(dbpath, mmap.or(Some(MMAP_DEFAULT)))?;
        let root = rehydrator.root(rootname, rootversion)?.ok_or_else(|| {
            crate::error::SprayDryError::Config(format!(
                "no such root: '{rootname}' version '{rootversion}'"
            ))
        })?;
        Ok(Self {
            rehydrator,
            root,
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
            inode_offset: FUSE_ROOT_ID,
        })
    }

    /// Mount and serve until unmounted. At most one mount per process.
    pub fn run(self, mountpoint: &Path) -> Result<()> {
        let options = [MountOption::RO, MountOption::FSName("spraydryfs".into())];
        info!("mounting on {}", mountpoint.display());
        fuser::mount2(self, mountpoint, &options)?;
        info!("unmounted");
        Ok(())
    }

    fn attrs(&self, entry: &Entry) -> FileAttr {
        FileAttr {
            ino: entry
                .id
                .map(|id| id as u64 + self.inode_offset)
                .unwrap_or(FUSE_ROOT_ID),
            size: entry.size,
            blocks: 0,
            atime: SystemTime::UNIX_EPOCH,
            mtime: SystemTime::UNIX_EPOCH,
            ctime: SystemTime::UNIX_EPOCH,
            crtime: SystemTime::UNIX_EPOCH,
            kind: if entry.isdir {
                FileType::Directory
            } else {
                FileType::RegularFile
            },
            perm: entry.mode & 0o7777,
            nlink: 1,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: 4096,
            flags: 0,
        }
    }

    fn load(&self, ino: u64) -> OpResult<Entry> {
        if ino == FUSE_ROOT_ID {
            return Ok(self.root.clone());
        }
        match self.rehydrator.attributes((ino - self.inode_offset) as i64) {
            Ok(Some(entry)) => Ok(entry),
            Ok(None) => Err(libc::ENOENT),
            Err(e) => {
                warn!("attribute lookup for inode {ino} failed: {e}");
                Err(libc::EIO)
            }
        }
    }

    /// The file id behind an inode: root's stored file for the mount
    /// root, the entry's file otherwise.
    fn file_id(&self, ino: u64) -> OpResult<i64> {
        self.load(ino).map(|entry| entry.file)
    }

    fn lookup_entry(&self, parent: u64, name: &[u8]) -> OpResult<Entry> {
        let dirfile = self.file_id(parent)?;
        match self.rehydrator.entry(dirfile, name) {
            Ok(Some(entry)) => Ok(entry),
            Ok(None) => Err(libc::ENOENT),
            Err(e) => {
                warn!("entry lookup in directory file {dirfile} failed: {e}");
                Err(libc::EIO)
            }
        }
    }
}

impl Filesystem for SprayDryFs {
    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        debug!("getattr: inode {ino}");
        match self.load(ino) {
            Ok(entry) => reply.attr(&TTL, &self.attrs(&entry)),
            Err(errno) => reply.error(errno),
        }
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        debug!("lookup: inode {parent}, name {name:?}");
        match self.lookup_entry(parent, name.as_bytes()) {
            Ok(entry) => reply.entry(&TTL, &self.attrs(&entry), 0),
            Err(errno) => reply.error(errno),
        }
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        debug!("opendir: inode {ino}");
        match self.load(ino) {
            Ok(entry) if entry.isdir => reply.opened(ino, 0),
            Ok(_) => reply.error(libc::ENOENT),
            Err(errno) => reply.error(errno),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        debug!("readdir: handle {fh}, offset {offset}");
        let dirfile = match self.file_id(fh) {
            Ok(dirfile) => dirfile,
            Err(errno) => {
                reply.error(errno);
                return;
            }
        };
        let walked = self.rehydrator.for_each_entry(dirfile, offset.max(0) as u64, |rownum, entry| {
            let attrs = self.attrs(&entry);
            // The row number is the resume cursor for the next call.
            !reply.add(
                attrs.ino,
                rownum as i64,
                attrs.kind,
                OsStr::from_bytes(&entry.name),
            )
        });
        match walked {
            Ok(()) => reply.ok(),
            Err(e) => {
                warn!("readdir on directory file {dirfile} failed: {e}");
                reply.error(libc::EIO);
            }
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        debug!("open: inode {ino}, flags {flags:#o}");
        if wants_write(flags) {
            reply.error(libc::EACCES);
            return;
        }
        match self.load(ino) {
            Ok(_) => reply.opened(ino, fuser::consts::FOPEN_KEEP_CACHE),
            Err(errno) => reply.error(errno),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        debug!("read: handle {fh}, offset {offset}, size {size}");
        let fileid = match self.file_id(fh) {
            Ok(fileid) => fileid,
            Err(errno) => {
                reply.error(errno);
                return;
            }
        };
        match self
            .rehydrator
            .pread(fileid, offset.max(0) as u64, size as u64)
        {
            Ok(data) => reply.data(&data),
            Err(e) => {
                warn!("read of file {fileid} failed: {e}");
                reply.error(libc::EIO);
            }
        }
    }
}
