//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

use haproxy_converger::config::{HaproxyConfig, TimeoutConfig};
use haproxy_converger::source::{
    DesiredState, EndpointInfo, LocalInstance, ProxyConfiguration, RuntimeConfiguration,
    ServiceEndpoints,
};
use haproxy_converger::Converger;

pub const TEMPLATE: &str = "global\n  maxconn 100\n\nbackend web\n{% for b in Endpoints(\"web\") %}  server {{ b.nickname }} {{ b.host_port }} check\n{% endfor %}";

/// A stats socket that answers `show stat` with canned CSV and records
/// every other batch it receives.
pub struct FakeStatsSocket {
    pub path: PathBuf,
    stat: Arc<Mutex<String>>,
    received: Arc<Mutex<Vec<String>>>,
}

impl FakeStatsSocket {
    pub fn start(path: &Path, csv: &str) -> Self {
        let listener = UnixListener::bind(path).unwrap();
        let stat = Arc::new(Mutex::new(csv.to_string()));
        let received = Arc::new(Mutex::new(Vec::new()));

        let (s, r) = (stat.clone(), received.clone());
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let (s, r) = (s.clone(), r.clone());
                tokio::spawn(handle(stream, s, r));
            }
        });

        Self {
            path: path.to_path_buf(),
            stat,
            received,
        }
    }

    pub fn set_stat(&self, csv: &str) {
        *self.stat.lock().unwrap() = csv.to_string();
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    /// Wait until `count` command batches arrived.
    pub async fn wait_for_batches(&self, count: usize) -> Vec<String> {
        for _ in 0..200 {
            let received = self.received();
            if received.len() >= count {
                return received;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {count} command batches, got {:?}", self.received());
    }
}

async fn handle(stream: UnixStream, stat: Arc<Mutex<String>>, received: Arc<Mutex<Vec<String>>>) {
    let mut reader = BufReader::new(stream);
    let mut first = String::new();
    if reader.read_line(&mut first).await.is_err() {
        return;
    }

    if first == "show stat\n" {
        let csv = stat.lock().unwrap().clone();
        let stream = reader.get_mut();
        let _ = stream.write_all(csv.as_bytes()).await;
        let _ = stream.shutdown().await;
        return;
    }

    let mut rest = String::new();
    let _ = reader.read_to_string(&mut rest).await;
    received.lock().unwrap().push(first + &rest);
}

/// `show stat` output with the given `(section, server, status)` rows.
pub fn stat_csv(rows: &[(&str, &str, &str)]) -> String {
    let mut out = String::from(
        "# pxname,svname,qcur,qmax,scur,smax,slim,stot,bin,bout,dreq,dresp,ereq,econ,eresp,wretr,wredis,status,weight\n",
    );
    let mut sections: Vec<&str> = Vec::new();
    for (section, server, status) in rows {
        if !sections.contains(section) {
            sections.push(section);
        }
        out.push_str(&stat_row(section, server, status));
    }
    for section in sections {
        out.push_str(&stat_row(section, "BACKEND", "UP"));
    }
    out.push('\n');
    out
}

fn stat_row(section: &str, server: &str, status: &str) -> String {
    let mut fields = vec![""; 19];
    fields[0] = section;
    fields[1] = server;
    fields[17] = status;
    fields[18] = "1";
    format!("{}\n", fields.join(","))
}

/// Reload command that appends a line to `counter` each time it runs.
pub fn counting_reload(dir: &Path) -> (String, PathBuf) {
    let script = dir.join("reload.sh");
    let counter = dir.join("reloads");
    std::fs::write(&script, "#!/bin/sh\necho reload >> \"$1\"\n").unwrap();
    (format!("sh {} {}", script.display(), counter.display()), counter)
}

pub fn reload_count(counter: &Path) -> usize {
    std::fs::read_to_string(counter)
        .map(|s| s.lines().count())
        .unwrap_or(0)
}

pub fn haproxy_in(dir: &Path, binary: &str, reload_command: String) -> HaproxyConfig {
    HaproxyConfig {
        binary: binary.to_string(),
        config_path: dir.to_path_buf(),
        reload_command,
        socket: format!("{}/haproxy*.sock", dir.display()),
        ..HaproxyConfig::default()
    }
}

pub fn converger(haproxy: HaproxyConfig) -> Converger {
    let timeouts = TimeoutConfig {
        syntax_check_secs: 5,
        reload_secs: 5,
        socket_secs: 1,
    };
    Converger::new(haproxy, timeouts, LocalInstance::new("us-east-1a"))
}

pub fn runtime(template: &str, services: &[(&str, &[&str])]) -> RuntimeConfiguration {
    let desired: DesiredState = services
        .iter()
        .map(|(service, host_ports)| {
            let endpoints: ServiceEndpoints = host_ports
                .iter()
                .map(|hp| {
                    (
                        hp.to_string(),
                        EndpointInfo {
                            revision: "r1".to_string(),
                            availability_zone: "us-east-1a".to_string(),
                            ..EndpointInfo::default()
                        },
                    )
                })
                .collect();
            (service.to_string(), endpoints)
        })
        .collect();

    RuntimeConfiguration {
        haproxy: Some(ProxyConfiguration {
            template: template.to_string(),
            ..ProxyConfiguration::default()
        }),
        service_backends: desired,
    }
}
