use anyhow::Result;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

/// stderr とログファイルの両方へ書く
struct Tee {
    file: BufWriter<File>,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// `logs/<name>_<timestamp>.log`
fn log_file_path(name: &str) -> PathBuf {
    let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
    PathBuf::from("logs").join(format!("{}_{}.log", name, ts))
}

/// ロガーを初期化して起動バナーを出す。ログファイルのパスを返す
///
/// ログファイルを作れない場合は stderr のみに出力する。
pub fn init(name: &str) -> Result<Option<PathBuf>> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    let path = log_file_path(name);
    let opened = fs::create_dir_all("logs").and_then(|_| File::create(&path));
    let log_path = match opened {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(Tee { file: BufWriter::new(file) })));
            Some(path)
        }
        Err(e) => {
            eprintln!("Log file unavailable ({}), logging to stderr only", e);
            None
        }
    };
    builder.try_init()?;

    log::info!("{} ({})", name, env!("GIT_VERSION"));
    if let Some(p) = &log_path {
        log::info!("Log: {}", p.display());
    }
    Ok(log_path)
}
