//! Document store on a tablet reached over ssh.
//!
//! A control-master connection is opened once and reused by every command;
//! bulk uploads go through rsync and downloads through the device's USB web
//! interface.

use super::{check_id, Device};
use crate::config::ResyncConfig;
use crate::error::{Result, SyncError};
use crate::metadata::{parse_listing, MetadataRecord};
use crate::types::DocumentId;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use tracing::{debug, info, warn};

pub struct SshDevice {
    host: String,
    remote_dir: String,
    ssh_options: Vec<String>,
    socket: PathBuf,
    restart_command: String,
    dry_run: bool,
    master: Option<Child>,
}

/// Bare addresses get the device's `root@` login, anything else is an ssh alias.
pub fn ssh_target(host: &str) -> String {
    if host.parse::<IpAddr>().is_ok() {
        format!("root@{host}")
    } else {
        host.to_string()
    }
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

impl SshDevice {
    /// Open the control-master session and check that commands go through.
    pub fn connect(config: &ResyncConfig, dry_run: bool) -> Result<Self> {
        let mut device = Self {
            host: ssh_target(&config.host),
            remote_dir: config.remote_dir.clone(),
            ssh_options: config.ssh_options.clone(),
            socket: config.ssh_socket.clone(),
            restart_command: config.restart_command.clone(),
            dry_run,
            master: None,
        };
        info!(host = %device.host, "opening ssh connection");
        let master = device
            .ssh_command()
            .arg("-M")
            .arg("-N")
            .arg("-q")
            .stdin(Stdio::null())
            .spawn()?;
        device.master = Some(master);

        // Right after a firmware update the device may refuse connections.
        if let Err(e) = device.run("/bin/true") {
            let message = match e {
                SyncError::Transport { stderr, .. } => stderr,
                other => other.to_string(),
            };
            return Err(SyncError::Unreachable {
                host: device.host.clone(),
                message,
            });
        }
        Ok(device)
    }

    fn ssh_command(&self) -> Command {
        let mut cmd = Command::new("ssh");
        for option in &self.ssh_options {
            cmd.arg("-o").arg(option);
        }
        cmd.arg("-S").arg(&self.socket).arg(&self.host);
        cmd
    }

    fn ssh_command_line(&self) -> String {
        let mut line = String::from("ssh");
        for option in &self.ssh_options {
            line.push_str(&format!(" -o {}", option));
        }
        line.push_str(&format!(" -S {}", self.socket.display()));
        line
    }

    /// Run `remote` on the device and return its stdout.
    fn run(&self, remote: &str) -> Result<String> {
        debug!(command = %remote, "ssh");
        let output = self.ssh_command().arg(remote).output()?;
        if !output.status.success() {
            return Err(SyncError::Transport {
                command: remote.to_string(),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Like [`Self::run`] but only logs the command in dry-run mode.
    fn run_mutating(&self, remote: &str) -> Result<()> {
        if self.dry_run {
            info!(command = %remote, "dry run: would run");
            return Ok(());
        }
        self.run(remote).map(|_| ())
    }

    fn web_host(&self) -> &str {
        self.host.rsplit('@').next().unwrap_or(&self.host)
    }
}

impl Drop for SshDevice {
    fn drop(&mut self) {
        if let Some(mut master) = self.master.take() {
            debug!("terminating ssh connection");
            if let Err(e) = master.kill() {
                warn!("failed to terminate ssh master: {}", e);
            }
            let _ = master.wait();
        }
    }
}

impl Device for SshDevice {
    fn fetch_metadata(&mut self) -> Result<Vec<(DocumentId, MetadataRecord)>> {
        info!("retrieving metadata");
        let paths = self.run(&format!("ls -1 {}/*.metadata", self.remote_dir))?;
        let contents = self.run(&format!("cat {}/*.metadata", self.remote_dir))?;
        parse_listing(&paths, &contents)
    }

    fn fingerprint_listing(&mut self) -> Result<String> {
        info!("computing md5sum of each document, the first run takes a while");
        let dir = &self.remote_dir;
        self.run(&format!(
            "for f in {dir}/*.pdf ; do \
             if [ ! -e $f.md5sum ] ; then md5sum $f > $f.md5sum ; fi ; \
             done ; cat {dir}/*.md5sum"
        ))
    }

    fn list_orphans(&mut self) -> Result<Vec<String>> {
        let dir = &self.remote_dir;
        let listing = self.run(&format!(
            "ls -1 {dir} | while read f ; do stem=${{f%%.*}} ; \
             if ! [ -e {dir}/$stem.metadata ] ; then echo $f ; fi ; done"
        ))?;
        Ok(listing
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn remove_orphans(&mut self, files: &[String]) -> Result<()> {
        if files.is_empty() {
            return Ok(());
        }
        let quoted: Vec<String> = files.iter().map(|f| shell_quote(f)).collect();
        self.run_mutating(&format!(
            "cd {} && rm -r -- {}",
            self.remote_dir,
            quoted.join(" ")
        ))
    }

    fn remove_ids(&mut self, ids: &[DocumentId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut globs = Vec::with_capacity(ids.len());
        for id in ids {
            check_id(id)?;
            globs.push(format!("{}/{}*", self.remote_dir, id));
        }
        self.run_mutating(&format!("rm -rv {}", globs.join(" ")))
    }

    fn upload(&mut self, staging: &Path) -> Result<()> {
        let mut cmd = Command::new("rsync");
        cmd.arg("-a")
            .arg("--info=progress2")
            .arg("-e")
            .arg(self.ssh_command_line());
        if self.dry_run {
            cmd.arg("-n");
        }
        // The trailing slashes copy the directory's contents, not the directory.
        cmd.arg(format!("{}/", staging.display()))
            .arg(format!("{}:{}/", self.host, self.remote_dir));
        info!(command = ?cmd, "running rsync");
        let status = cmd.status()?;
        if !status.success() {
            return Err(SyncError::Transport {
                command: "rsync".to_string(),
                status: status.code().unwrap_or(-1),
                stderr: String::new(),
            });
        }
        Ok(())
    }

    fn download_document(&mut self, id: &str, target: &Path) -> Result<()> {
        check_id(id)?;
        if self.dry_run {
            info!(target = %target.display(), "dry run: would download");
            return Ok(());
        }
        let url = format!("http://{}/download/{}/placeholder", self.web_host(), id);
        debug!(url = %url, "downloading");
        let response = reqwest::blocking::get(&url)
            .and_then(|r| r.error_for_status())
            .map_err(|e| SyncError::Download {
                id: id.to_string(),
                reason: format!(
                    "{e}: is the web interface enabled? (Settings > Storage > USB web interface)"
                ),
            })?;
        let bytes = response.bytes().map_err(|e| SyncError::Download {
            id: id.to_string(),
            reason: e.to_string(),
        })?;
        std::fs::write(target, &bytes)?;
        Ok(())
    }

    fn restart(&mut self) -> Result<()> {
        info!("restarting document service");
        self.run_mutating(&self.restart_command)
    }
}
