//! Directory walking
//!
//! Discovers playable files below one or more roots. Which files count as
//! playable is decided by the caller (normally the backend registry).

use std::path::{ Path, PathBuf };

use thiserror::Error;


/// Errors that can occur while walking directories.
#[derive( Debug, Error )]
pub enum LibraryError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Path not found: {0}" )]
    NotFound( PathBuf ),
}


/// Recursive, sorted directory walker.
pub struct LibraryScanner {
    roots: Vec<PathBuf>,
}


impl LibraryScanner {
    /// Creates a new scanner with no root directories.
    pub fn new() -> Self {
        Self { roots: Vec::new() }
    }


    /// Adds a root directory to scan.
    pub fn add_root( &mut self, path: PathBuf ) {
        if !self.roots.contains( &path ) {
            self.roots.push( path );
        }
    }


    /// Gets all root directories.
    pub fn roots( &self ) -> &[PathBuf] {
        &self.roots
    }


    /// Scans all roots and returns the accepted files.
    ///
    /// Directory entries are visited in lexical order, so albums keep their
    /// track numbering.
    ///
    /// @param accept - Decides whether a file is kept
    ///
    /// @returns Accepted files in walk order
    pub fn scan( &self, accept: impl Fn( &Path ) -> bool ) -> Result<Vec<PathBuf>, LibraryError> {
        let mut files = Vec::new();

        for root in &self.roots {
            tracing::debug!( "Scanning: {:?}", root );
            self.scan_recursive( root, &accept, &mut files )?;
        }

        tracing::debug!( "Found {} files", files.len() );
        Ok( files )
    }


    fn scan_recursive(
        &self,
        dir: &Path,
        accept: &impl Fn( &Path ) -> bool,
        files: &mut Vec<PathBuf>,
    ) -> Result<(), LibraryError> {
        let entries = match std::fs::read_dir( dir ) {
            Ok( e ) => e,
            Err( e ) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                tracing::warn!( "Access denied: {:?}", dir );
                return Ok(());
            }
            Err( e ) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err( LibraryError::NotFound( dir.to_path_buf() ) );
            }
            Err( e ) => return Err( LibraryError::Io( e ) ),
        };

        let mut paths: Vec<PathBuf> = entries.flatten().map( |e| e.path() ).collect();
        paths.sort();

        for path in paths {
            if path.is_dir() {
                self.scan_recursive( &path, accept, files )?;
            } else if accept( &path ) {
                files.push( path );
            }
        }

        Ok(())
    }
}


impl Default for LibraryScanner {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_scan_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir( dir.path().join( "b" ) ).unwrap();
        std::fs::write( dir.path().join( "b" ).join( "2.ogg" ), b"" ).unwrap();
        std::fs::write( dir.path().join( "b" ).join( "1.ogg" ), b"" ).unwrap();
        std::fs::write( dir.path().join( "a.ogg" ), b"" ).unwrap();
        std::fs::write( dir.path().join( "notes.txt" ), b"" ).unwrap();

        let mut scanner = LibraryScanner::new();
        scanner.add_root( dir.path().to_path_buf() );
        scanner.add_root( dir.path().to_path_buf() );
        assert_eq!( scanner.roots().len(), 1 );

        let files = scanner
            .scan( |p| p.extension().map_or( false, |e| e == "ogg" ) )
            .unwrap();
        let names: Vec<_> = files
            .iter()
            .map( |p| p.strip_prefix( dir.path() ).unwrap().to_string_lossy().to_string() )
            .collect();
        assert_eq!( names, vec![ "a.ogg", "b/1.ogg", "b/2.ogg" ] );
    }


    #[test]
    fn test_scan_missing_root() {
        let mut scanner = LibraryScanner::new();
        scanner.add_root( PathBuf::from( "/no/such/tapedeck/dir" ) );
        assert!( matches!( scanner.scan( |_| true ), Err( LibraryError::NotFound( _ ) ) ) );
    }
}
