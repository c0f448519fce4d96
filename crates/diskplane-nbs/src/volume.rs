//! Volume descriptors as reported by a zone's volume service, and the create
//! request a clone derives from them.

use serde::{Deserialize, Serialize};

/// Kind of media backing a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMediaKind {
    /// Zone default media.
    #[default]
    Default,
    /// Replicated SSD.
    Ssd,
    /// SSD and HDD mix.
    Hybrid,
    /// Replicated HDD.
    Hdd,
    /// Single-copy SSD on disk agents.
    SsdNonreplicated,
    /// SSD with two mirrors.
    SsdMirror2,
    /// SSD with three mirrors.
    SsdMirror3,
    /// Host-local SSD.
    SsdLocal,
    /// Single-copy HDD on disk agents.
    HddNonreplicated,
}

/// Encryption applied to a volume's blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionMode {
    /// Plain blocks.
    #[default]
    NoEncryption,
    /// AES-XTS with a caller key.
    AesXts,
    /// AES-XTS with a service-managed key.
    DefaultAesXts,
}

/// Encryption as described on an existing volume.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EncryptionDesc {
    pub mode: EncryptionMode,
    /// Hash of the key the blocks are encrypted with.
    pub key_hash: Vec<u8>,
}

/// Encryption as requested for a new volume. Only the key hash is carried;
/// the key itself never leaves the zone that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EncryptionSpec {
    pub mode: EncryptionMode,
    /// Hash of the key to encrypt with.
    pub key_hash: Vec<u8>,
}

impl From<&EncryptionDesc> for EncryptionSpec {
    fn from(desc: &EncryptionDesc) -> Self {
        Self {
            mode: desc.mode,
            key_hash: desc.key_hash.clone(),
        }
    }
}

/// Read-only snapshot of a volume in one zone.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VolumeDescriptor {
    /// Volume identity, unique within a zone.
    pub disk_id: String,
    /// Bytes per block.
    pub block_size: u32,
    /// Volume size in blocks.
    pub blocks_count: u64,
    /// Backing media.
    pub storage_media_kind: StorageMediaKind,
    /// Storage tablet version.
    pub tablet_version: u32,
    /// Placement group the volume is spread over.
    pub placement_group_id: String,
    /// Partition within the placement group.
    pub placement_partition_index: u32,
    /// Number of storage partitions.
    pub partitions_count: u32,
    /// Owning cloud.
    pub cloud_id: String,
    /// Owning folder.
    pub folder_id: String,
    /// Owning project.
    pub project_id: String,
    /// Number of storage channels.
    pub channels_count: u32,
    /// Whether the volume belongs to the service itself.
    pub is_system: bool,
    /// Encryption of the blocks.
    pub encryption_desc: EncryptionDesc,
    /// Base disk of an overlay; empty otherwise.
    pub base_disk_id: String,
    /// Checkpoint of the base disk the overlay reads from.
    pub base_disk_checkpoint_id: String,
    /// Zone-local storage pool.
    pub storage_pool_name: String,
    /// Disk agents hosting the volume.
    pub agent_ids: Vec<String>,
    /// Generation of the fill targeting this volume; 0 if it is not a fill target.
    pub fill_generation: u64,
    /// Set by the storage engine once the fill completed. Never reset.
    pub is_fill_finished: bool,
}

/// Options of a create request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CreateVolumeOpts {
    /// Base disk to overlay; empty for plain volumes.
    pub base_disk_id: String,
    /// Base disk checkpoint to read from.
    pub base_disk_checkpoint_id: String,
    /// Bytes per block.
    pub block_size: u32,
    /// Backing media.
    pub storage_media_kind: StorageMediaKind,
    /// Owning cloud.
    pub cloud_id: String,
    /// Owning folder.
    pub folder_id: String,
    /// Owning project.
    pub project_id: String,
    /// Storage tablet version.
    pub tablet_version: u32,
    /// Placement group to spread over.
    pub placement_group_id: String,
    /// Partition within the placement group.
    pub placement_partition_index: u32,
    /// Number of storage partitions.
    pub partitions_count: u32,
    /// Whether the volume belongs to the service itself.
    pub is_system: bool,
    /// Number of storage channels.
    pub channels_count: u32,
    /// Encryption to apply.
    pub encryption_spec: EncryptionSpec,
    /// Zone-local storage pool.
    pub storage_pool_name: String,
    /// Disk agents to place the volume on.
    pub agent_ids: Vec<String>,
    /// Fill this volume is the target of; 0 for none.
    pub fill_generation: u64,
}

/// One clone attempt's create request, rebuilt from the source descriptor on
/// every attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClonePlan {
    /// Volume to create in the destination zone.
    pub disk_id: String,
    /// Size in blocks.
    pub blocks_count: u64,
    /// Create options.
    pub opts: CreateVolumeOpts,
}

impl ClonePlan {
    /// Copies the source's immutable attributes and tags the request with
    /// `fill_generation`.
    ///
    /// Clones are never overlays, and pool/agent placement of the source zone
    /// means nothing in the destination, so those fields stay empty.
    pub fn new(source: &VolumeDescriptor, fill_generation: u64) -> Self {
        let opts = CreateVolumeOpts {
            base_disk_id: String::new(),
            base_disk_checkpoint_id: String::new(),
            block_size: source.block_size,
            storage_media_kind: source.storage_media_kind,
            cloud_id: source.cloud_id.clone(),
            folder_id: source.folder_id.clone(),
            project_id: source.project_id.clone(),
            tablet_version: source.tablet_version,
            placement_group_id: source.placement_group_id.clone(),
            placement_partition_index: source.placement_partition_index,
            partitions_count: source.partitions_count,
            is_system: source.is_system,
            channels_count: source.channels_count,
            encryption_spec: EncryptionSpec::from(&source.encryption_desc),
            storage_pool_name: String::new(),
            agent_ids: Vec::new(),
            fill_generation,
        };

        Self {
            disk_id: source.disk_id.clone(),
            blocks_count: source.blocks_count,
            opts,
        }
    }
}
