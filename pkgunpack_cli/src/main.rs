#![deny(
    rust_2018_idioms,
    unreachable_pub,
    unsafe_code,
    unused_imports,
    unused_mut,
    missing_debug_implementations
)]

use anyhow::Context;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use pkgunpack::{
    archive::{ArchiveSink, ZipSink},
    content::ContentKind,
    error::PkgError,
    license::{License, ZrifDecoder},
    magic::Magic,
    package::{Package, PackageInfo},
    unpack::{unpack, Progress},
    RandomAccessFile,
};
use std::{
    fs::File,
    io::{BufWriter, Read},
    path::{Path, PathBuf},
};
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(about = "Unpacks PS Vita and PSP pkg files into zip archives")]
struct Opt {
    /// Package to unpack
    #[structopt(name = "PACKAGE", parse(from_os_str))]
    package: PathBuf,

    /// zRIF license token, installed as work.bin for games and DLC
    #[structopt(name = "LICENSE")]
    license: Option<String>,

    /// Directory to write the archive to
    #[structopt(
        short = "o",
        long = "output",
        parse(from_os_str),
        default_value = "."
    )]
    output_dir: PathBuf,

    /// Preset zlib dictionary the zRIF token was compressed against
    #[structopt(long = "zrif-dict", parse(from_os_str))]
    zrif_dict: Option<PathBuf>,

    /// Only list the package items
    #[structopt(short, long)]
    list: bool,
}

fn main() {
    env_logger::init();
    let opt = Opt::from_args();
    println!(
        "{}",
        format!("pkgunpack v{}", env!("CARGO_PKG_VERSION")).bold()
    );

    if let Err(err) = run(&opt) {
        eprintln!("{} {:#}", "ERROR:".red().bold(), err);
        std::process::exit(1);
    }
}

fn run(opt: &Opt) -> anyhow::Result<()> {
    if !opt.package.is_file() {
        return Err(PkgError::Usage(format!(
            "{:?} is not a file",
            opt.package
        ))
        .into());
    }
    check_magic(&opt.package)?;

    let package = Package::open_path(&opt.package)
        .with_context(|| format!("Could not open {:?}", opt.package))?;
    let info = package.info();
    print_info(info);

    let license = match &opt.license {
        Some(token) if info.accepts_license() => {
            let license = read_license(opt, token)?;
            license.validate(info.content_id().as_str())?;
            println!("[*] license matches {}", info.content_id());
            Some(license)
        }
        Some(_) => {
            log::warn!(
                "{} packages don't take a license, ignoring it",
                info.kind()
            );
            println!(
                "{}",
                format!("[!] {} package, ignoring the license", info.kind())
                    .yellow()
            );
            None
        }
        None => None,
    };

    if opt.list {
        return list_items(&package);
    }

    std::fs::create_dir_all(&opt.output_dir)?;
    let output = opt.output_dir.join(info.archive_name());
    println!("[*] creating {:?}", output);
    let result = write_archive(&package, &output, license.as_ref());
    if result.is_err() {
        if let Err(err) = std::fs::remove_file(&output) {
            log::debug!("Could not remove {:?}: {}", output, err);
        }
    }
    result?;
    println!("{}", "[*] done!".green());
    Ok(())
}

fn check_magic(path: &Path) -> anyhow::Result<()> {
    let mut magic = Vec::with_capacity(4);
    File::open(path)?.take(4).read_to_end(&mut magic)?;
    match Magic::parse(&magic) {
        Magic::Pkg => Ok(()),
        Magic::Zip => Err(PkgError::Format(format!(
            "{:?} is a zip archive, not a pkg file",
            path
        ))
        .into()),
        Magic::NotRecognized => {
            Err(PkgError::Format(format!("{:?} is not a pkg file", path))
                .into())
        }
    }
}

fn read_license(opt: &Opt, token: &str) -> anyhow::Result<License> {
    let decoder = match &opt.zrif_dict {
        Some(path) => ZrifDecoder::with_dictionary(
            std::fs::read(path)
                .with_context(|| format!("Could not read {:?}", path))?,
        ),
        None => ZrifDecoder::new(),
    };
    decoder.decode(token)
}

fn print_info(info: &PackageInfo) {
    println!("[*] unpacking {}", info.kind().as_str().cyan());
    println!("[*] content id: {}", info.content_id());
    println!("[*] title: {}", info.title().bold());
    if !info.kind().is_legacy() {
        println!("[*] region: {}", info.region());
    }
    match (info.kind(), info.min_version()) {
        (ContentKind::Game, Some(version))
        | (ContentKind::Patch, Some(version)) => {
            println!("[*] requires firmware {}", version.yellow())
        }
        _ => (),
    }
    if let Some(version) = info.app_version() {
        log::debug!("App version: {}", version);
    }
}

fn list_items(package: &Package<RandomAccessFile>) -> anyhow::Result<()> {
    for entry in package.items().iter() {
        let entry = entry?;
        if entry.is_directory() {
            println!("{:>12}  {}/", "-", entry.name.blue());
        } else {
            println!("{:>12}  {}", entry.data_size, entry.name);
        }
    }
    Ok(())
}

fn write_archive(
    package: &Package<RandomAccessFile>,
    output: &Path,
    license: Option<&License>,
) -> anyhow::Result<()> {
    let file = File::create(output)
        .with_context(|| format!("Could not create {:?}", output))?;
    let mut sink = ZipSink::new(BufWriter::new(file));
    let progress_bar = init_progressbar(
        "Unpacking",
        u64::from(package.items().len()),
    );

    unpack(package, &mut sink, license, &mut |event| match event {
        Progress::Item { index, name, .. } => {
            progress_bar.set_message(name);
            progress_bar.set_position(u64::from(index) + 1);
        }
        Progress::Trailer(name) => progress_bar.set_message(name),
    })?;
    sink.close()?;
    progress_bar.finish_and_clear();
    Ok(())
}

fn init_progressbar(prefix: &str, size: u64) -> ProgressBar {
    let progress_bar = ProgressBar::new(size).with_style(
        ProgressStyle::default_bar().template(
            " {spinner} {prefix} {wide_bar:} {pos:>6}/{len:6} {msg}",
        ),
    );
    progress_bar.set_prefix(prefix);
    progress_bar
}
