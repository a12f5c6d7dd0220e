//! HiveQL statement text and the matching action descriptions.

pub const USE_DESC: &str = "Selecting DB";
pub const CREATE_DESC: &str = "Creating Table";
pub const CREATE_SHADOW_DESC: &str = "Creating Shadow Table";
pub const CREATE_TRANSFER_DESC: &str = "Creating Transfer Table";
pub const DROP_DESC: &str = "Dropping Table";
pub const DROP_SHADOW_DESC: &str = "Dropping Shadow Table";
pub const DROP_TRANSFER_DESC: &str = "Dropping Transfer Table";
pub const DROP_ARCHIVE_DESC: &str = "Dropping Archived Table";
pub const RENAME_DESC: &str = "Renaming Table to Archive";
pub const MSCK_DESC: &str = "Repairing Table (MSCK)";
pub const ADD_PARTITION_DESC: &str = "Adding Partition";
pub const ALTER_TABLE_LOCATION_DESC: &str = "Alter Table Location";
pub const ALTER_PROPERTIES_DESC: &str = "Alter Table Properties";
pub const EXPORT_DESC: &str = "Export Table";
pub const IMPORT_DESC: &str = "Import Table";
pub const TRANSFER_DESC: &str = "Moving data to target table";
pub const SCRIPT_DESC: &str = "Table Definition";
pub const CREATE_DB_DESC: &str = "Create Database";

pub fn alter_partition_location_desc(spec: &str) -> String {
    format!("Alter Table Partition Spec {} Location", spec)
}

pub fn use_database(database: &str) -> String {
    format!("USE {}", database)
}

pub fn create_database(database: &str) -> String {
    format!("CREATE DATABASE IF NOT EXISTS {}", database)
}

pub fn alter_database_location(database: &str, location: &str) -> String {
    format!("ALTER DATABASE {} SET LOCATION \"{}\"", database, location)
}

pub fn alter_database_managed_location(database: &str, location: &str) -> String {
    format!(
        "ALTER DATABASE {} SET MANAGEDLOCATION \"{}\"",
        database, location
    )
}

pub fn drop_table(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", table)
}

pub fn rename_table(from: &str, to: &str) -> String {
    format!("ALTER TABLE {} RENAME TO {}", from, to)
}

pub fn msck_repair(table: &str) -> String {
    format!("MSCK REPAIR TABLE {}", table)
}

pub fn add_partition(table: &str, spec: &str, location: &str) -> String {
    format!(
        "ALTER TABLE {} ADD IF NOT EXISTS PARTITION ({}) LOCATION '{}'",
        table, spec, location
    )
}

pub fn alter_table_location(table: &str, location: &str) -> String {
    format!("ALTER TABLE {} SET LOCATION \"{}\"", table, location)
}

pub fn alter_partition_location(table: &str, spec: &str, location: &str) -> String {
    format!(
        "ALTER TABLE {} PARTITION ({}) SET LOCATION \"{}\"",
        table, spec, location
    )
}

pub fn set_table_property(table: &str, key: &str, value: &str) -> String {
    format!("ALTER TABLE {} SET TBLPROPERTIES ('{}'='{}')", table, key, value)
}

pub fn unset_table_property(table: &str, key: &str) -> String {
    format!("ALTER TABLE {} UNSET TBLPROPERTIES ('{}')", table, key)
}

/// `FROM source INSERT OVERWRITE TABLE target [PARTITION (cols)] SELECT *`.
pub fn insert_overwrite(source: &str, target: &str, partition_columns: &[String]) -> String {
    if partition_columns.is_empty() {
        format!("FROM {} INSERT OVERWRITE TABLE {} SELECT *", source, target)
    } else {
        format!(
            "FROM {} INSERT OVERWRITE TABLE {} PARTITION ({}) SELECT *",
            source,
            target,
            partition_columns.join(", ")
        )
    }
}

pub fn export_table(table: &str, directory: &str) -> String {
    format!("EXPORT TABLE {} TO \"{}\"", table, directory)
}

/// `IMPORT [EXTERNAL] TABLE t FROM "<dir>" [LOCATION "<loc>"]`.
pub fn import_table(table: &str, directory: &str, external: bool, location: Option<&str>) -> String {
    let mut statement = if external {
        format!("IMPORT EXTERNAL TABLE {} FROM \"{}\"", table, directory)
    } else {
        format!("IMPORT TABLE {} FROM \"{}\"", table, directory)
    };
    if let Some(location) = location {
        statement.push_str(&format!(" LOCATION \"{}\"", location));
    }
    statement
}
