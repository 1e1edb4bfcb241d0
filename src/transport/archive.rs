use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;
use tar::Archive;
use xz2::read::XzDecoder;
use zip::ZipArchive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveFormat {
    TarGz,
    TarXz,
    Tar,
    Zip,
    Plain,
}

impl ArchiveFormat {
    fn detect(archive_path: &Path) -> Self {
        let filename = archive_path
            .file_name()
            .and_then(|value| value.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if filename.ends_with(".tar.gz") || filename.ends_with(".tgz") {
            Self::TarGz
        } else if filename.ends_with(".tar.xz") || filename.ends_with(".txz") {
            Self::TarXz
        } else if filename.ends_with(".tar") {
            Self::Tar
        } else if filename.ends_with(".zip") || filename.ends_with(".nupkg") {
            Self::Zip
        } else {
            Self::Plain
        }
    }
}

/// Decompress `archive_path` into `dest`, choosing the decoder from the file
/// name. Files that are not a known archive are copied into `dest` unchanged.
pub fn extract_archive(archive_path: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).map_err(|err| Error::io("create unpack directory", dest, err))?;

    let open = || File::open(archive_path).map_err(|err| Error::unpack(archive_path, err));

    match ArchiveFormat::detect(archive_path) {
        ArchiveFormat::TarGz => unpack_tar(archive_path, GzDecoder::new(open()?), dest),
        ArchiveFormat::TarXz => unpack_tar(archive_path, XzDecoder::new(open()?), dest),
        ArchiveFormat::Tar => unpack_tar(archive_path, open()?, dest),
        ArchiveFormat::Zip => unpack_zip(archive_path, open()?, dest),
        ArchiveFormat::Plain => {
            let filename = archive_path.file_name().ok_or_else(|| {
                Error::unpack(archive_path, "archive path is missing a file name")
            })?;
            let target = dest.join(filename);
            fs::copy(archive_path, &target).map_err(|err| Error::unpack(archive_path, err))?;
            Ok(())
        }
    }
}

fn unpack_tar<R: Read>(archive_path: &Path, reader: R, dest: &Path) -> Result<()> {
    let mut archive = Archive::new(reader);
    archive.set_overwrite(true);
    archive
        .unpack(dest)
        .map_err(|err| Error::unpack(archive_path, err))
}

fn unpack_zip(archive_path: &Path, file: File, dest: &Path) -> Result<()> {
    let mut archive = ZipArchive::new(file).map_err(|err| Error::unpack(archive_path, err))?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|err| Error::unpack(archive_path, err))?;

        let Some(enclosed) = entry.enclosed_name().map(|path| dest.join(path)) else {
            continue;
        };

        if entry.name().ends_with('/') {
            fs::create_dir_all(&enclosed).map_err(|err| Error::unpack(archive_path, err))?;
            continue;
        }

        if let Some(parent) = enclosed.parent() {
            fs::create_dir_all(parent).map_err(|err| Error::unpack(archive_path, err))?;
        }

        let mut outfile = File::create(&enclosed).map_err(|err| Error::unpack(archive_path, err))?;
        io::copy(&mut entry, &mut outfile).map_err(|err| Error::unpack(archive_path, err))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&enclosed, fs::Permissions::from_mode(mode))
                    .map_err(|err| Error::unpack(archive_path, err))?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::collections::BTreeMap;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_tar_gz(path: &Path, files: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder
                .append_data(&mut header, name, contents.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    fn write_zip(path: &Path, files: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, contents) in files {
            writer
                .start_file(*name, zip::write::FileOptions::default())
                .unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    fn snapshot(root: &Path) -> BTreeMap<PathBuf, String> {
        let mut files = BTreeMap::new();
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in fs::read_dir(&dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    pending.push(path);
                } else {
                    let relative = path.strip_prefix(root).unwrap().to_path_buf();
                    files.insert(relative, fs::read_to_string(&path).unwrap());
                }
            }
        }
        files
    }

    #[test]
    fn detects_formats_from_file_name() {
        assert_eq!(ArchiveFormat::detect(Path::new("go.tar.gz")), ArchiveFormat::TarGz);
        assert_eq!(ArchiveFormat::detect(Path::new("go.TGZ")), ArchiveFormat::TarGz);
        assert_eq!(ArchiveFormat::detect(Path::new("go.tar.xz")), ArchiveFormat::TarXz);
        assert_eq!(ArchiveFormat::detect(Path::new("go.tar")), ArchiveFormat::Tar);
        assert_eq!(ArchiveFormat::detect(Path::new("go.zip")), ArchiveFormat::Zip);
        assert_eq!(ArchiveFormat::detect(Path::new("go.bin")), ArchiveFormat::Plain);
    }

    #[test]
    fn unpacks_tar_gz() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("go.tgz");
        write_tar_gz(&archive, &[("bin/go", "#!/bin/sh\n"), ("README", "go")]);

        let dest = temp.path().join("go.1.2");
        extract_archive(&archive, &dest).unwrap();

        assert_eq!(fs::read_to_string(dest.join("bin/go")).unwrap(), "#!/bin/sh\n");
        assert_eq!(fs::read_to_string(dest.join("README")).unwrap(), "go");
    }

    #[test]
    fn unpacks_zip() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("tool.zip");
        write_zip(&archive, &[("tool/bin/tool", "tool"), ("tool/LICENSE", "MIT")]);

        let dest = temp.path().join("tool.1.0");
        extract_archive(&archive, &dest).unwrap();

        assert_eq!(fs::read_to_string(dest.join("tool/bin/tool")).unwrap(), "tool");
        assert_eq!(fs::read_to_string(dest.join("tool/LICENSE")).unwrap(), "MIT");
    }

    #[test]
    fn unpacking_twice_yields_same_contents() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("go.tar.gz");
        write_tar_gz(&archive, &[("bin/go", "go"), ("lib/std", "std")]);

        let dest = temp.path().join("go.1.2");
        extract_archive(&archive, &dest).unwrap();
        let first = snapshot(&dest);
        extract_archive(&archive, &dest).unwrap();
        assert_eq!(snapshot(&dest), first);
    }

    #[test]
    fn corrupt_archive_is_unpack_error() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("broken.zip");
        fs::write(&archive, b"this is not a zip file").unwrap();

        let err = extract_archive(&archive, &temp.path().join("out")).unwrap_err();
        assert!(matches!(err, Error::Unpack { .. }));
    }

    #[test]
    fn plain_file_is_copied() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("script.sh");
        fs::write(&source, "echo hi").unwrap();

        let dest = temp.path().join("out");
        extract_archive(&source, &dest).unwrap();
        assert_eq!(fs::read_to_string(dest.join("script.sh")).unwrap(), "echo hi");
    }
}
