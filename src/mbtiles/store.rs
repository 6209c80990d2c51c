use std::{collections::BTreeMap, path::{Path, PathBuf}};

use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Transaction};
use tracing::debug;

use crate::error::TileError;
use crate::tile::TileCoord;

/// Fixed MBTiles schema. `tile_row` is stored in TMS order.
const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS metadata (name TEXT, value TEXT);
    CREATE TABLE IF NOT EXISTS tiles (
        zoom_level INTEGER,
        tile_column INTEGER,
        tile_row INTEGER,
        tile_data BLOB
    );
    CREATE UNIQUE INDEX IF NOT EXISTS tile_index ON tiles (zoom_level, tile_column, tile_row);
    DELETE FROM metadata;
    DELETE FROM tiles;
";

const INSERT_TILE: &str =
    "INSERT OR REPLACE INTO tiles (zoom_level, tile_column, tile_row, tile_data) VALUES (?1, ?2, ?3, ?4)";

/// A single-file MBTiles container.
///
/// Callers address tiles in XYZ; rows are flipped to TMS on every read and write.
#[derive(Debug)]
pub struct MbTiles {
    conn: Connection,
    path: PathBuf,
}

impl MbTiles {
    /// Open (or create) a store for writing and initialize the schema, clearing any rows.
    pub fn create(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to create MBTiles at {}", path.display()))?;
        conn.execute_batch(SCHEMA)
            .with_context(|| format!("Failed to initialize MBTiles schema in {}", path.display()))?;
        debug!(path = %path.display(), "initialized MBTiles schema");
        Ok(Self { conn, path: path.to_path_buf() })
    }

    /// Open an existing store read-only.
    ///
    /// Fails with [`TileError::StoreMissing`] if the file does not exist and
    /// [`TileError::InvalidStore`] if it is not an MBTiles database.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(TileError::StoreMissing(path.to_path_buf()).into());
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX)
            .with_context(|| format!("Failed to open MBTiles at {}", path.display()))?;

        let tables: Result<i64, rusqlite::Error> = conn.query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name IN ('metadata', 'tiles')",
            [],
            |row| row.get(0),
        );
        match tables {
            Ok(2) => Ok(Self { conn, path: path.to_path_buf() }),
            Ok(_) => Err(TileError::InvalidStore(path.to_path_buf(), "missing metadata or tiles table".into()).into()),
            Err(err) => Err(TileError::InvalidStore(path.to_path_buf(), err.to_string()).into()),
        }
    }

    /// Path of the underlying file.
    #[inline] pub fn path(&self) -> &Path { &self.path }

    /// All metadata rows as a map. A repeated key keeps its last value.
    pub fn metadata(&self) -> Result<BTreeMap<String, String>> {
        let mut stmt = self.conn.prepare_cached("SELECT name, value FROM metadata")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)))?;

        let mut metadata = BTreeMap::new();
        for row in rows {
            let (name, value) = row?;
            metadata.insert(name, value.unwrap_or_default());
        }
        Ok(metadata)
    }

    /// Payload of the tile at an XYZ coordinate, `None` if absent or off the grid.
    pub fn tile(&self, coord: TileCoord) -> Result<Option<Vec<u8>>> {
        if !coord.is_valid() {
            return Ok(None);
        }
        let mut stmt = self.conn.prepare_cached(
            "SELECT tile_data FROM tiles WHERE zoom_level = ?1 AND tile_column = ?2 AND tile_row = ?3",
        )?;
        let data = stmt.query_row(params![coord.z, coord.x, coord.tms_row()], |row| row.get(0))
            .optional()
            .with_context(|| format!("Failed to read tile {coord}"))?;
        Ok(data)
    }

    /// Replace the whole metadata table with `entries`.
    pub fn write_metadata_batch(&mut self, entries: &[(String, String)]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM metadata", [])?;
        {
            let mut stmt = tx.prepare("INSERT INTO metadata (name, value) VALUES (?1, ?2)")?;
            for (name, value) in entries {
                stmt.execute(params![name, value])?;
            }
        }
        tx.commit().context("Failed to commit metadata")?;
        Ok(())
    }

    /// Insert or replace a single tile at an XYZ coordinate.
    pub fn write_tile(&self, coord: TileCoord, data: &[u8]) -> Result<()> {
        insert_tile(&self.conn, coord, data)
    }

    /// Start a transaction for writing many tiles.
    pub fn writer(&mut self) -> Result<TileWriter<'_>> {
        Ok(TileWriter { tx: self.conn.transaction()?, written: 0 })
    }

    /// Every populated coordinate, in XYZ addressing, sorted.
    pub fn tile_coords(&self) -> Result<Vec<TileCoord>> {
        let mut stmt = self.conn.prepare_cached("SELECT zoom_level, tile_column, tile_row FROM tiles")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, u8>(0)?, row.get::<_, u32>(1)?, row.get::<_, u32>(2)?)))?;

        let mut coords = Vec::new();
        for row in rows {
            let (z, x, tms_row) = row?;
            let coord = TileCoord { z, x, y: tms_row };
            if !coord.is_valid() {
                bail!("stored tile {z}/{x}/{tms_row} is outside the grid");
            }
            coords.push(TileCoord::from_tms(z, x, tms_row));
        }
        coords.sort();
        Ok(coords)
    }

    /// Number of stored tiles.
    pub fn tile_count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT count(*) FROM tiles", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn insert_tile(conn: &Connection, coord: TileCoord, data: &[u8]) -> Result<()> {
    if !coord.is_valid() {
        bail!("tile {coord} is outside the grid");
    }
    let mut stmt = conn.prepare_cached(INSERT_TILE)?;
    stmt.execute(params![coord.z, coord.x, coord.tms_row(), data])
        .with_context(|| format!("Failed to write tile {coord}"))?;
    Ok(())
}

/// A transaction over the tiles table. Nothing is visible until [`TileWriter::commit`].
pub struct TileWriter<'a> {
    tx: Transaction<'a>,
    written: usize,
}

impl TileWriter<'_> {
    /// Insert or replace a tile at an XYZ coordinate.
    pub fn write(&mut self, coord: TileCoord, data: &[u8]) -> Result<()> {
        insert_tile(&self.tx, coord, data)?;
        self.written += 1;
        Ok(())
    }

    /// Tiles written so far.
    #[inline] pub fn written(&self) -> usize { self.written }

    /// Commit and return the number of tiles written.
    pub fn commit(self) -> Result<usize> {
        let written = self.written;
        self.tx.commit().context("Failed to commit tiles")?;
        Ok(written)
    }
}
