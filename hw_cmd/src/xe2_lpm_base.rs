// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! MI, GFX pipe and VDBOX control command layouts of the Xe2 LPM base media engine.
//!
//! Bit positions are given as inclusive `low..=high` ranges relative to the first dword of the
//! field, exactly as the hardware documentation lists them. Default dwords are the values the
//! hardware programming guide mandates for a freshly initialized command, including the
//! length field and any non-zero payload defaults.

use crate::field::AddressDef;
use crate::field::EnumValue;
use crate::field::FieldDef;
use crate::registry::Family;
use crate::registry::InstructionDef;
use crate::registry::InstructionKind;
use crate::registry::InstructionRegistry;

pub static REGISTRY: InstructionRegistry = InstructionRegistry::new("xe2_lpm_base", &DEFS);

const MI_OPCODE: &[&str] = &["MiCommandOpcode", "CommandType"];

const ADDRESS_SPACE: &[EnumValue] = &[EnumValue::new("GGTT", 0), EnumValue::new("PPGTT", 1)];

const NESTED_LEVEL: &[EnumValue] = &[EnumValue::new("CHAIN", 0), EnumValue::new("NESTED", 1)];

const GRAPHICS_ADDRESS: &[EnumValue] = &[
    EnumValue::new("PER_PROCESS_GRAPHICS_ADDRESS", 0),
    EnumValue::new("GLOBAL_GRAPHICS_ADDRESS", 1),
];

const PREDICATE_ENABLE: &[EnumValue] = &[
    EnumValue::new("PREDICATE_DISABLE", 0),
    EnumValue::new("NOOP_ON_RESULT2_CLEAR", 1),
    EnumValue::new("NOOP_ON_RESULT2_SET", 2),
    EnumValue::new("NOOP_ALWAYS", 15),
];

const PREDICATE_ENABLE_WPARID: &[EnumValue] = &[
    EnumValue::new("NOOP_NEVER", 0),
    EnumValue::new("NOOP_ON_ZERO_VALUE", 1),
    EnumValue::new("NOOP_ON_NON_ZERO_VALUE", 2),
];

const PIPELINED_POST_SYNC: &[EnumValue] = &[
    EnumValue::new("NO_POST_SYNC_OPERATION", 0),
    EnumValue::new("POST_SYNC_OPERATION", 1),
];

const SEMAPHORE_COMPARE: &[EnumValue] = &[
    EnumValue::new("SAD_GREATER_THAN_SDD", 0),
    EnumValue::new("SAD_GREATER_THAN_OR_EQUAL_SDD", 1),
    EnumValue::new("SAD_LESS_THAN_SDD", 2),
    EnumValue::new("SAD_LESS_THAN_OR_EQUAL_SDD", 3),
    EnumValue::new("SAD_EQUAL_SDD", 4),
    EnumValue::new("SAD_NOT_EQUAL_SDD", 5),
];

const WAIT_MODE: &[EnumValue] = &[
    EnumValue::new("SIGNAL_MODE", 0),
    EnumValue::new("POLLING_MODE", 1),
];

const REGISTER_POLL_MODE: &[EnumValue] = &[
    EnumValue::new("MEMORY_POLL", 0),
    EnumValue::new("REGISTER_POLL", 1),
];

const CONDITIONAL_COMPARE: &[EnumValue] = &[
    EnumValue::new("MAD_GREATER_THAN_IDD", 0),
    EnumValue::new("MAD_GREATER_THAN_OR_EQUAL_IDD", 1),
    EnumValue::new("MAD_LESS_THAN_IDD", 2),
    EnumValue::new("MAD_LESS_THAN_OR_EQUAL_IDD", 3),
    EnumValue::new("MAD_EQUAL_IDD", 4),
    EnumValue::new("MAD_NOT_EQUAL_IDD", 5),
];

const COMPARE_MASK_MODE: &[EnumValue] = &[
    EnumValue::new("COMPARE_MASK_MODE_DISABLED", 0),
    EnumValue::new("COMPARE_MASK_MODE_ENABLED", 1),
];

const ATOMIC_DATA_SIZE: &[EnumValue] = &[
    EnumValue::new("DWORD", 0),
    EnumValue::new("QWORD", 1),
    EnumValue::new("OCTWORD", 2),
];

const FLUSH_POST_SYNC: &[EnumValue] = &[
    EnumValue::new("NO_WRITE", 0),
    EnumValue::new("WRITE_IMMEDIATE_DATA", 1),
    EnumValue::new("WRITE_TIMESTAMP", 3),
];

const DESTINATION_ADDRESS_TYPE: &[EnumValue] =
    &[EnumValue::new("PPGTT", 0), EnumValue::new("GGTT", 1)];

const POWER_WELL: &[EnumValue] = &[
    EnumValue::new("DISABLE_POWER_WELL", 0),
    EnumValue::new("ENABLE_POWER_WELL", 1),
];

const PIPE_CONTROL_POST_SYNC: &[EnumValue] = &[
    EnumValue::new("NO_WRITE", 0),
    EnumValue::new("WRITE_IMMEDIATE_DATA", 1),
    EnumValue::new("WRITE_PS_DEPTH_COUNT", 2),
    EnumValue::new("WRITE_TIMESTAMP", 3),
];

const LRI_POST_SYNC: &[EnumValue] = &[
    EnumValue::new("NO_LRI_OPERATION", 0),
    EnumValue::new("MMIO_WRITE_IMMEDIATE_DATA", 1),
];

const MEDIA_INSTRUCTION_COMMAND: &[EnumValue] = &[
    EnumValue::new("VD_CONTROL_STATE_FOR_HCP", 10),
    EnumValue::new("VD_CONTROL_STATE_FOR_VDENC", 11),
];

const MEDIA_INSTRUCTION_OPCODE: &[EnumValue] = &[
    EnumValue::new("CODEC_ENGINE_NAME_FOR_VDENC", 1),
    EnumValue::new("CODEC_ENGINE_NAME_FOR_AVP", 3),
    EnumValue::new("CODEC_ENGINE_NAME_FOR_HCP", 7),
];

const DOP_CLOCKGATE: &[EnumValue] = &[EnumValue::new("ENABLE", 0), EnumValue::new("DISABLE", 1)];

const MI_BATCH_BUFFER_END: &[FieldDef] = &[
    FieldDef::new("EndContext", 0, 0, 0),
    FieldDef::new("PredicateEnable", 0, 15, 15),
    FieldDef::new("MiCommandOpcode", 0, 23, 28),
    FieldDef::new("CommandType", 0, 29, 31),
];

const MI_NOOP: &[FieldDef] = &[
    FieldDef::new("IdentificationNumber", 0, 0, 21),
    FieldDef::new("IdentificationNumberRegisterWriteEnable", 0, 22, 22),
    FieldDef::new("MiCommandOpcode", 0, 23, 28),
    FieldDef::new("CommandType", 0, 29, 31),
];

const MI_ARB_CHECK: &[FieldDef] = &[
    FieldDef::new("PreParserDisable", 0, 0, 0),
    FieldDef::new("MaskBits", 0, 8, 15),
    FieldDef::new("MiCommandOpcode", 0, 23, 28),
    FieldDef::new("CommandType", 0, 29, 31),
];

const MI_LOAD_REGISTER_IMM: &[FieldDef] = &[
    FieldDef::new("DwordLength", 0, 0, 7),
    FieldDef::new("ByteWriteDisables", 0, 8, 11),
    FieldDef::new("ForcePosted", 0, 12, 12),
    FieldDef::new("MmioRemapEnable", 0, 17, 17),
    FieldDef::new("AddCsMmioStartOffset", 0, 19, 19),
    FieldDef::new("MiCommandOpcode", 0, 23, 28),
    FieldDef::new("CommandType", 0, 29, 31),
    FieldDef::new("RegisterOffset", 1, 2, 22),
    FieldDef::new("DataDword", 2, 0, 31),
];

const MI_LOAD_REGISTER_MEM: &[FieldDef] = &[
    FieldDef::new("DwordLength", 0, 0, 7),
    FieldDef::new("WorkloadPartitionIdOffsetEnable", 0, 16, 16),
    FieldDef::new("MmioRemapEnable", 0, 17, 17),
    FieldDef::new("AddCsMmioStartOffset", 0, 19, 19),
    FieldDef::new("AsyncModeEnable", 0, 21, 21),
    FieldDef::new("UseGlobalGtt", 0, 22, 22).enumerated(GRAPHICS_ADDRESS),
    FieldDef::new("MiCommandOpcode", 0, 23, 28),
    FieldDef::new("CommandType", 0, 29, 31),
    FieldDef::new("RegisterAddress", 1, 2, 22),
    FieldDef::new("MemoryAddress", 2, 2, 63),
];

const MI_LOAD_REGISTER_REG: &[FieldDef] = &[
    FieldDef::new("DwordLength", 0, 0, 7),
    FieldDef::new("MmioRemapEnableSource", 0, 16, 16),
    FieldDef::new("MmioRemapEnableDestination", 0, 17, 17),
    FieldDef::new("AddCsMmioStartOffsetSource", 0, 18, 18),
    FieldDef::new("AddCsMmioStartOffsetDestination", 0, 19, 19),
    FieldDef::new("MiCommandOpcode", 0, 23, 28),
    FieldDef::new("CommandType", 0, 29, 31),
    FieldDef::new("SourceRegisterAddress", 1, 2, 22),
    FieldDef::new("DestinationRegisterAddress", 2, 2, 22),
];

const MI_STORE_REGISTER_MEM: &[FieldDef] = &[
    FieldDef::new("DwordLength", 0, 0, 7),
    FieldDef::new("WorkloadPartitionIdOffsetEnable", 0, 16, 16),
    FieldDef::new("MmioRemapEnable", 0, 17, 17),
    FieldDef::new("AddCsMmioStartOffset", 0, 19, 19),
    FieldDef::new("PredicateEnable", 0, 21, 21),
    FieldDef::new("UseGlobalGtt", 0, 22, 22).enumerated(GRAPHICS_ADDRESS),
    FieldDef::new("MiCommandOpcode", 0, 23, 28),
    FieldDef::new("CommandType", 0, 29, 31),
    FieldDef::new("RegisterAddress", 1, 2, 22),
    FieldDef::new("MemoryAddress", 2, 2, 63),
];

const MI_BATCH_BUFFER_START: &[FieldDef] = &[
    FieldDef::new("DwordLength", 0, 0, 7),
    FieldDef::new("AddressSpaceIndicator", 0, 8, 8).enumerated(ADDRESS_SPACE),
    FieldDef::new("PredicationEnable", 0, 15, 15),
    FieldDef::new("EnableCommandCache", 0, 19, 19),
    FieldDef::new("PoshEnable", 0, 20, 20),
    FieldDef::new("PoshStart", 0, 21, 21),
    FieldDef::new("NestedLevelBatchBuffer", 0, 22, 22).enumerated(NESTED_LEVEL),
    FieldDef::new("MiCommandOpcode", 0, 23, 28),
    FieldDef::new("CommandType", 0, 29, 31),
    FieldDef::new("BatchBufferStartAddress", 1, 2, 63),
];

const MI_SET_PREDICATE: &[FieldDef] = &[
    FieldDef::new("PredicateEnable", 0, 0, 3).enumerated(PREDICATE_ENABLE),
    FieldDef::new("PredicateEnableWparid", 0, 4, 5).enumerated(PREDICATE_ENABLE_WPARID),
    FieldDef::new("MiCommandOpcode", 0, 23, 28),
    FieldDef::new("CommandType", 0, 29, 31),
];

const MI_COPY_MEM_MEM: &[FieldDef] = &[
    FieldDef::new("DwordLength", 0, 0, 7),
    FieldDef::new("UseGlobalGttDestination", 0, 21, 21).enumerated(GRAPHICS_ADDRESS),
    FieldDef::new("UseGlobalGttSource", 0, 22, 22).enumerated(GRAPHICS_ADDRESS),
    FieldDef::new("MiCommandOpcode", 0, 23, 28),
    FieldDef::new("CommandType", 0, 29, 31),
    FieldDef::new("DestinationMemoryAddress", 1, 2, 63),
    FieldDef::new("SourceMemoryAddress", 3, 2, 63),
];

const MI_STORE_DATA_IMM: &[FieldDef] = &[
    FieldDef::new("DwordLength", 0, 0, 9),
    FieldDef::new("ForceWriteCompletionCheck", 0, 10, 10),
    FieldDef::new("WorkloadPartitionIdOffsetEnable", 0, 11, 11),
    FieldDef::new("StoreQword", 0, 21, 21),
    FieldDef::new("UseGlobalGtt", 0, 22, 22).enumerated(GRAPHICS_ADDRESS),
    FieldDef::new("MiCommandOpcode", 0, 23, 28),
    FieldDef::new("CommandType", 0, 29, 31),
    FieldDef::new("CoreModeEnable", 1, 0, 0),
    FieldDef::new("Address", 1, 2, 63),
    FieldDef::new("DataDword0", 3, 0, 31),
    FieldDef::new("DataDword1", 4, 0, 31),
];

const MI_SEMAPHORE_SIGNAL: &[FieldDef] = &[
    FieldDef::new("DwordLength", 0, 0, 7),
    FieldDef::new("PostSyncOperation", 0, 21, 21).enumerated(PIPELINED_POST_SYNC),
    FieldDef::new("MiCommandOpcode", 0, 23, 28),
    FieldDef::new("CommandType", 0, 29, 31),
];

const MI_SEMAPHORE_WAIT: &[FieldDef] = &[
    FieldDef::new("DwordLength", 0, 0, 7),
    FieldDef::new("CompareOperation", 0, 12, 14).enumerated(SEMAPHORE_COMPARE),
    FieldDef::new("WaitMode", 0, 15, 15).enumerated(WAIT_MODE),
    FieldDef::new("RegisterPollMode", 0, 16, 16).enumerated(REGISTER_POLL_MODE),
    FieldDef::new("IndirectSemaphoreDataDword", 0, 17, 17),
    FieldDef::new("WorkloadPartitionIdOffsetEnable", 0, 18, 18),
    FieldDef::new("MemoryType", 0, 22, 22).enumerated(GRAPHICS_ADDRESS),
    FieldDef::new("MiCommandOpcode", 0, 23, 28),
    FieldDef::new("CommandType", 0, 29, 31),
    FieldDef::new("SemaphoreDataDword", 1, 0, 31),
    FieldDef::new("SemaphoreAddress", 2, 2, 63),
    FieldDef::new("WaitTokenNumber", 4, 2, 9),
];

const MI_CONDITIONAL_BATCH_BUFFER_END: &[FieldDef] = &[
    FieldDef::new("DwordLength", 0, 0, 7),
    FieldDef::new("CompareOperation", 0, 12, 14).enumerated(CONDITIONAL_COMPARE),
    FieldDef::new("PredicateEnable", 0, 15, 15),
    FieldDef::new("EndCurrentBatchBufferLevel", 0, 18, 18),
    FieldDef::new("CompareMaskMode", 0, 19, 19).enumerated(COMPARE_MASK_MODE),
    FieldDef::new("CompareSemaphore", 0, 21, 21),
    FieldDef::new("UseGlobalGtt", 0, 22, 22).enumerated(GRAPHICS_ADDRESS),
    FieldDef::new("MiCommandOpcode", 0, 23, 28),
    FieldDef::new("CommandType", 0, 29, 31),
    FieldDef::new("CompareDataDword", 1, 0, 31),
    FieldDef::new("CompareAddress", 2, 3, 63),
];

const MI_ATOMIC: &[FieldDef] = &[
    FieldDef::new("DwordLength", 0, 0, 7),
    FieldDef::new("AtomicOpcode", 0, 8, 15),
    FieldDef::new("ReturnDataControl", 0, 16, 16),
    FieldDef::new("CsStall", 0, 17, 17),
    FieldDef::new("InlineData", 0, 18, 18),
    FieldDef::new("DataSize", 0, 19, 20).enumerated(ATOMIC_DATA_SIZE),
    FieldDef::new("PostSyncOperation", 0, 21, 21).enumerated(PIPELINED_POST_SYNC),
    FieldDef::new("MemoryType", 0, 22, 22).enumerated(GRAPHICS_ADDRESS),
    FieldDef::new("MiCommandOpcode", 0, 23, 28),
    FieldDef::new("CommandType", 0, 29, 31),
    FieldDef::new("WorkloadPartitionIdOffsetEnable", 1, 0, 0),
    FieldDef::new("MemoryAddress", 1, 2, 31),
    FieldDef::new("MemoryAddressHigh", 2, 0, 15),
    FieldDef::new("Operand1DataDword0", 3, 0, 31),
    FieldDef::new("Operand2DataDword0", 4, 0, 31),
    FieldDef::new("Operand1DataDword1", 5, 0, 31),
    FieldDef::new("Operand2DataDword1", 6, 0, 31),
    FieldDef::new("Operand1DataDword2", 7, 0, 31),
    FieldDef::new("Operand2DataDword2", 8, 0, 31),
    FieldDef::new("Operand1DataDword3", 9, 0, 31),
    FieldDef::new("Operand2DataDword3", 10, 0, 31),
];

const MI_MATH: &[FieldDef] = &[
    FieldDef::new("DwordLength", 0, 0, 7),
    FieldDef::new("MemoryObjectControlState", 0, 8, 14),
    FieldDef::new("PredicationEnable", 0, 15, 15),
    FieldDef::new("MiCommandOpcode", 0, 23, 28),
    FieldDef::new("CommandType", 0, 29, 31),
];

const MI_FLUSH_DW: &[FieldDef] = &[
    FieldDef::new("DwordLength", 0, 0, 5),
    FieldDef::new("VideoPipelineCacheInvalidate", 0, 7, 7),
    FieldDef::new("NotifyEnable", 0, 8, 8),
    FieldDef::new("FlushLlc", 0, 9, 9),
    FieldDef::new("PostSyncOperation", 0, 14, 15).enumerated(FLUSH_POST_SYNC),
    FieldDef::new("FlushCcs", 0, 16, 16),
    FieldDef::new("TlbInvalidate", 0, 18, 18),
    FieldDef::new("FlushPpc", 0, 19, 19),
    FieldDef::new("StoreDataIndex", 0, 21, 21),
    FieldDef::new("MiCommandOpcode", 0, 23, 28),
    FieldDef::new("CommandType", 0, 29, 31),
    FieldDef::new("DestinationAddressType", 1, 2, 2).enumerated(DESTINATION_ADDRESS_TYPE),
    FieldDef::new("DestinationAddress", 1, 3, 47),
    FieldDef::new("ImmediateData", 3, 0, 63),
];

const MI_FORCE_WAKEUP: &[FieldDef] = &[
    FieldDef::new("DwordLength", 0, 0, 7),
    FieldDef::new("MiCommandOpcode", 0, 23, 28),
    FieldDef::new("CommandType", 0, 29, 31),
    FieldDef::new("ForceMediaSlice0Awake", 1, 0, 0),
    FieldDef::new("ForceRenderAwake", 1, 1, 1),
    FieldDef::new("ForceMediaSlice1Awake", 1, 2, 2),
    FieldDef::new("ForceMediaSlice2Awake", 1, 3, 3),
    FieldDef::new("ForceMediaSlice3Awake", 1, 4, 4),
    FieldDef::new("HevcPowerWellControl", 1, 8, 8).enumerated(POWER_WELL),
    FieldDef::new("MfxPowerWellControl", 1, 9, 9).enumerated(POWER_WELL),
    FieldDef::new("MaskBits", 1, 16, 31),
];

const MI_USER_INTERRUPT: &[FieldDef] = &[
    FieldDef::new("MiCommandOpcode", 0, 23, 28),
    FieldDef::new("CommandType", 0, 29, 31),
];

const PIPE_CONTROL: &[FieldDef] = &[
    FieldDef::new("DwordLength", 0, 0, 7),
    FieldDef::new("PredicateEnable", 0, 8, 8),
    FieldDef::new("DataportFlush", 0, 9, 9),
    FieldDef::new("L3ReadOnlyCacheInvalidationEnable", 0, 10, 10),
    FieldDef::new("UnTypedDataPortCacheFlush", 0, 11, 11),
    FieldDef::new("CompressionControlSurfaceCcsFlush", 0, 13, 13),
    FieldDef::new("WorkloadPartitionIdOffsetEnable", 0, 14, 14),
    FieldDef::new("3DCommandSubOpcode", 0, 16, 23),
    FieldDef::new("3DCommandOpcode", 0, 24, 26),
    FieldDef::new("CommandSubtype", 0, 27, 28),
    FieldDef::new("CommandType", 0, 29, 31),
    FieldDef::new("DepthCacheFlushEnable", 1, 0, 0),
    FieldDef::new("StallAtPixelScoreboard", 1, 1, 1),
    FieldDef::new("StateCacheInvalidationEnable", 1, 2, 2),
    FieldDef::new("ConstantCacheInvalidationEnable", 1, 3, 3),
    FieldDef::new("VfCacheInvalidationEnable", 1, 4, 4),
    FieldDef::new("DcFlushEnable", 1, 5, 5),
    FieldDef::new("PipeControlFlushEnable", 1, 7, 7),
    FieldDef::new("NotifyEnable", 1, 8, 8),
    FieldDef::new("IndirectStatePointersDisable", 1, 9, 9),
    FieldDef::new("TextureCacheInvalidationEnable", 1, 10, 10),
    FieldDef::new("InstructionCacheInvalidateEnable", 1, 11, 11),
    FieldDef::new("RenderTargetCacheFlushEnable", 1, 12, 12),
    FieldDef::new("DepthStallEnable", 1, 13, 13),
    FieldDef::new("PostSyncOperation", 1, 14, 15).enumerated(PIPE_CONTROL_POST_SYNC),
    FieldDef::new("GenericMediaStateClear", 1, 16, 16),
    FieldDef::new("PssStallSyncEnable", 1, 17, 17),
    FieldDef::new("TlbInvalidate", 1, 18, 18),
    FieldDef::new("DepthStallSyncEnable", 1, 19, 19),
    FieldDef::new("CommandStreamerStallEnable", 1, 20, 20),
    FieldDef::new("StoreDataIndex", 1, 21, 21),
    FieldDef::new("LriPostSyncOperation", 1, 23, 23).enumerated(LRI_POST_SYNC),
    FieldDef::new("DestinationAddressType", 1, 24, 24).enumerated(DESTINATION_ADDRESS_TYPE),
    FieldDef::new("AmfsFlushEnable", 1, 25, 25),
    FieldDef::new("FlushLlc", 1, 26, 26),
    FieldDef::new("TileCacheFlushEnable", 1, 28, 28),
    FieldDef::new("CommandCacheInvalidateEnable", 1, 29, 29),
    FieldDef::new("L3FabricFlush", 1, 30, 30),
    FieldDef::new("TbimrForceBatchClosure", 1, 31, 31),
    FieldDef::new("Address", 2, 2, 31),
    FieldDef::new("AddressHigh", 3, 0, 31),
    FieldDef::new("ImmediateData", 4, 0, 63),
];

const MFX_WAIT: &[FieldDef] = &[
    FieldDef::new("DwordLength", 0, 0, 5),
    FieldDef::new("MfxSyncControlFlag", 0, 8, 8),
    FieldDef::new("SubOpcode", 0, 16, 26),
    FieldDef::new("CommandSubtype", 0, 27, 28),
    FieldDef::new("CommandType", 0, 29, 31),
];

const VD_CONTROL_STATE: &[FieldDef] = &[
    FieldDef::new("DwordLength", 0, 0, 11),
    FieldDef::new("MediaInstructionCommand", 0, 16, 22).enumerated(MEDIA_INSTRUCTION_COMMAND),
    FieldDef::new("MediaInstructionOpcode", 0, 23, 26).enumerated(MEDIA_INSTRUCTION_OPCODE),
    FieldDef::new("PipelineType", 0, 27, 28),
    FieldDef::new("CommandType", 0, 29, 31),
    FieldDef::new("PipelineInitialization", 1, 0, 0),
    FieldDef::new("VdboxPipelineArchitectureClockgateDisable", 1, 1, 1),
    FieldDef::new("MfxDopClockgateControl", 1, 28, 28).enumerated(DOP_CLOCKGATE),
    FieldDef::new("HcpDopClockgateControl", 1, 29, 29).enumerated(DOP_CLOCKGATE),
    FieldDef::new("ScalableModePipeLock", 2, 0, 0),
    FieldDef::new("ScalableModePipeUnlock", 2, 1, 1),
    FieldDef::new("MemoryImplicitFlush", 2, 2, 2),
];

const MEDIA_STATE_FLUSH: &[FieldDef] = &[
    FieldDef::new("DwordLength", 0, 0, 15),
    FieldDef::new("Subopcode", 0, 16, 23),
    FieldDef::new("MediaCommandOpcode", 0, 24, 26),
    FieldDef::new("Pipeline", 0, 27, 28),
    FieldDef::new("CommandType", 0, 29, 31),
    FieldDef::new("InterfaceDescriptorOffset", 1, 0, 5),
    FieldDef::new("FlushToGo", 1, 7, 7),
];

static DEFS: [InstructionDef; 23] = [
    InstructionDef {
        kind: InstructionKind::MiBatchBufferEnd,
        name: "MI_BATCH_BUFFER_END",
        family: Family::Mi,
        defaults: &[0x0500_0000],
        opcode: MI_OPCODE,
        length: None,
        variable_length: false,
        fields: MI_BATCH_BUFFER_END,
        addresses: &[],
    },
    InstructionDef {
        kind: InstructionKind::MiNoop,
        name: "MI_NOOP",
        family: Family::Mi,
        defaults: &[0x0000_0000],
        opcode: MI_OPCODE,
        length: None,
        variable_length: false,
        fields: MI_NOOP,
        addresses: &[],
    },
    InstructionDef {
        kind: InstructionKind::MiArbCheck,
        name: "MI_ARB_CHECK",
        family: Family::Mi,
        defaults: &[0x0280_0000],
        opcode: MI_OPCODE,
        length: None,
        variable_length: false,
        fields: MI_ARB_CHECK,
        addresses: &[],
    },
    InstructionDef {
        kind: InstructionKind::MiLoadRegisterImm,
        name: "MI_LOAD_REGISTER_IMM",
        family: Family::Mi,
        defaults: &[0x1100_0001, 0, 0],
        opcode: MI_OPCODE,
        length: Some("DwordLength"),
        variable_length: true,
        fields: MI_LOAD_REGISTER_IMM,
        addresses: &[AddressDef::single("RegisterOffset")],
    },
    InstructionDef {
        kind: InstructionKind::MiLoadRegisterMem,
        name: "MI_LOAD_REGISTER_MEM",
        family: Family::Mi,
        defaults: &[0x1480_0002, 0, 0, 0],
        opcode: MI_OPCODE,
        length: Some("DwordLength"),
        variable_length: false,
        fields: MI_LOAD_REGISTER_MEM,
        addresses: &[
            AddressDef::single("RegisterAddress"),
            AddressDef::single("MemoryAddress"),
        ],
    },
    InstructionDef {
        kind: InstructionKind::MiLoadRegisterReg,
        name: "MI_LOAD_REGISTER_REG",
        family: Family::Mi,
        defaults: &[0x1500_0001, 0, 0],
        opcode: MI_OPCODE,
        length: Some("DwordLength"),
        variable_length: false,
        fields: MI_LOAD_REGISTER_REG,
        addresses: &[
            AddressDef::single("SourceRegisterAddress"),
            AddressDef::single("DestinationRegisterAddress"),
        ],
    },
    InstructionDef {
        kind: InstructionKind::MiStoreRegisterMem,
        name: "MI_STORE_REGISTER_MEM",
        family: Family::Mi,
        defaults: &[0x1200_0002, 0, 0, 0],
        opcode: MI_OPCODE,
        length: Some("DwordLength"),
        variable_length: false,
        fields: MI_STORE_REGISTER_MEM,
        addresses: &[
            AddressDef::single("RegisterAddress"),
            AddressDef::single("MemoryAddress"),
        ],
    },
    InstructionDef {
        kind: InstructionKind::MiBatchBufferStart,
        name: "MI_BATCH_BUFFER_START",
        family: Family::Mi,
        defaults: &[0x1880_0001, 0, 0],
        opcode: MI_OPCODE,
        length: Some("DwordLength"),
        variable_length: false,
        fields: MI_BATCH_BUFFER_START,
        addresses: &[AddressDef::single("BatchBufferStartAddress")],
    },
    InstructionDef {
        kind: InstructionKind::MiSetPredicate,
        name: "MI_SET_PREDICATE",
        family: Family::Mi,
        defaults: &[0x0080_0000],
        opcode: MI_OPCODE,
        length: None,
        variable_length: false,
        fields: MI_SET_PREDICATE,
        addresses: &[],
    },
    InstructionDef {
        kind: InstructionKind::MiCopyMemMem,
        name: "MI_COPY_MEM_MEM",
        family: Family::Mi,
        defaults: &[0x1700_0003, 0, 0, 0, 0],
        opcode: MI_OPCODE,
        length: Some("DwordLength"),
        variable_length: false,
        fields: MI_COPY_MEM_MEM,
        addresses: &[
            AddressDef::single("DestinationMemoryAddress"),
            AddressDef::single("SourceMemoryAddress"),
        ],
    },
    InstructionDef {
        kind: InstructionKind::MiStoreDataImm,
        name: "MI_STORE_DATA_IMM",
        family: Family::Mi,
        defaults: &[0x1000_0003, 0, 0, 0, 0],
        opcode: MI_OPCODE,
        length: Some("DwordLength"),
        variable_length: false,
        fields: MI_STORE_DATA_IMM,
        addresses: &[AddressDef::single("Address")],
    },
    InstructionDef {
        kind: InstructionKind::MiSemaphoreSignal,
        name: "MI_SEMAPHORE_SIGNAL",
        family: Family::Mi,
        defaults: &[0x0d80_0000, 0],
        opcode: MI_OPCODE,
        length: Some("DwordLength"),
        variable_length: false,
        fields: MI_SEMAPHORE_SIGNAL,
        addresses: &[],
    },
    InstructionDef {
        kind: InstructionKind::MiSemaphoreWait,
        name: "MI_SEMAPHORE_WAIT",
        family: Family::Mi,
        // Register poll mode is set in the hardware default.
        defaults: &[0x0e01_0003, 0, 0, 0, 0],
        opcode: MI_OPCODE,
        length: Some("DwordLength"),
        variable_length: false,
        fields: MI_SEMAPHORE_WAIT,
        addresses: &[AddressDef::single("SemaphoreAddress")],
    },
    InstructionDef {
        kind: InstructionKind::MiConditionalBatchBufferEnd,
        name: "MI_CONDITIONAL_BATCH_BUFFER_END",
        family: Family::Mi,
        defaults: &[0x1b00_0002, 0, 0, 0],
        opcode: MI_OPCODE,
        length: Some("DwordLength"),
        variable_length: false,
        fields: MI_CONDITIONAL_BATCH_BUFFER_END,
        addresses: &[AddressDef::single("CompareAddress")],
    },
    InstructionDef {
        kind: InstructionKind::MiAtomic,
        name: "MI_ATOMIC",
        family: Family::Mi,
        defaults: &[0x1780_0009, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
        opcode: MI_OPCODE,
        length: Some("DwordLength"),
        variable_length: false,
        fields: MI_ATOMIC,
        addresses: &[AddressDef::split(
            "MemoryAddress",
            "MemoryAddress",
            "MemoryAddressHigh",
        )],
    },
    InstructionDef {
        kind: InstructionKind::MiMath,
        name: "MI_MATH",
        family: Family::Mi,
        defaults: &[0x0d00_0000],
        opcode: MI_OPCODE,
        length: Some("DwordLength"),
        variable_length: true,
        fields: MI_MATH,
        addresses: &[],
    },
    InstructionDef {
        kind: InstructionKind::MiFlushDw,
        name: "MI_FLUSH_DW",
        family: Family::Mi,
        defaults: &[0x1300_0003, 0, 0, 0, 0],
        opcode: MI_OPCODE,
        length: Some("DwordLength"),
        variable_length: false,
        fields: MI_FLUSH_DW,
        addresses: &[AddressDef::single("DestinationAddress")],
    },
    InstructionDef {
        kind: InstructionKind::MiForceWakeup,
        name: "MI_FORCE_WAKEUP",
        family: Family::Mi,
        defaults: &[0x0e80_0000, 0],
        opcode: MI_OPCODE,
        length: Some("DwordLength"),
        variable_length: false,
        fields: MI_FORCE_WAKEUP,
        addresses: &[],
    },
    InstructionDef {
        kind: InstructionKind::MiUserInterrupt,
        name: "MI_USER_INTERRUPT",
        family: Family::Mi,
        defaults: &[0x0100_0000],
        opcode: MI_OPCODE,
        length: None,
        variable_length: false,
        fields: MI_USER_INTERRUPT,
        addresses: &[],
    },
    InstructionDef {
        kind: InstructionKind::PipeControl,
        name: "PIPE_CONTROL",
        family: Family::Gfx,
        defaults: &[0x7a00_0004, 0, 0, 0, 0, 0],
        opcode: &[
            "3DCommandSubOpcode",
            "3DCommandOpcode",
            "CommandSubtype",
            "CommandType",
        ],
        length: Some("DwordLength"),
        variable_length: false,
        fields: PIPE_CONTROL,
        addresses: &[AddressDef::split("Address", "Address", "AddressHigh")],
    },
    InstructionDef {
        kind: InstructionKind::MfxWait,
        name: "MFX_WAIT",
        family: Family::Vdbox,
        defaults: &[0x6800_0000],
        opcode: &["SubOpcode", "CommandSubtype", "CommandType"],
        length: Some("DwordLength"),
        variable_length: false,
        fields: MFX_WAIT,
        addresses: &[],
    },
    InstructionDef {
        kind: InstructionKind::VdControlState,
        name: "VD_CONTROL_STATE",
        family: Family::Vdbox,
        defaults: &[0x738a_0001, 0, 0],
        opcode: &[
            "MediaInstructionCommand",
            "MediaInstructionOpcode",
            "PipelineType",
            "CommandType",
        ],
        length: Some("DwordLength"),
        variable_length: false,
        fields: VD_CONTROL_STATE,
        addresses: &[],
    },
    InstructionDef {
        kind: InstructionKind::MediaStateFlush,
        name: "MEDIA_STATE_FLUSH",
        family: Family::Gfx,
        defaults: &[0x7004_0000, 0],
        opcode: &["Subopcode", "MediaCommandOpcode", "Pipeline", "CommandType"],
        length: Some("DwordLength"),
        variable_length: false,
        fields: MEDIA_STATE_FLUSH,
        addresses: &[],
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute_length;
    use crate::Domain;

    #[test]
    fn default_patterns() {
        let expected: &[(InstructionKind, &[u32])] = &[
            (InstructionKind::MiBatchBufferEnd, &[0x0500_0000]),
            (InstructionKind::MiNoop, &[0]),
            (InstructionKind::MiArbCheck, &[0x0280_0000]),
            (InstructionKind::MiLoadRegisterImm, &[0x1100_0001, 0, 0]),
            (InstructionKind::MiLoadRegisterMem, &[0x1480_0002, 0, 0, 0]),
            (InstructionKind::MiLoadRegisterReg, &[0x1500_0001, 0, 0]),
            (InstructionKind::MiStoreRegisterMem, &[0x1200_0002, 0, 0, 0]),
            (InstructionKind::MiBatchBufferStart, &[0x1880_0001, 0, 0]),
            (InstructionKind::MiSetPredicate, &[0x0080_0000]),
            (InstructionKind::MiCopyMemMem, &[0x1700_0003, 0, 0, 0, 0]),
            (InstructionKind::MiStoreDataImm, &[0x1000_0003, 0, 0, 0, 0]),
            (InstructionKind::MiSemaphoreSignal, &[0x0d80_0000, 0]),
            (InstructionKind::MiSemaphoreWait, &[0x0e01_0003, 0, 0, 0, 0]),
            (InstructionKind::MiConditionalBatchBufferEnd, &[0x1b00_0002, 0, 0, 0]),
            (
                InstructionKind::MiAtomic,
                &[0x1780_0009, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            ),
            (InstructionKind::MiMath, &[0x0d00_0000]),
            (InstructionKind::MiFlushDw, &[0x1300_0003, 0, 0, 0, 0]),
            (InstructionKind::MiForceWakeup, &[0x0e80_0000, 0]),
            (InstructionKind::MiUserInterrupt, &[0x0100_0000]),
            (InstructionKind::PipeControl, &[0x7a00_0004, 0, 0, 0, 0, 0]),
            (InstructionKind::MfxWait, &[0x6800_0000]),
            (InstructionKind::VdControlState, &[0x738a_0001, 0, 0]),
            (InstructionKind::MediaStateFlush, &[0x7004_0000, 0]),
        ];
        assert_eq!(expected.len(), REGISTRY.iter().count());
        for (kind, dwords) in expected {
            let rec = REGISTRY.define(*kind).unwrap();
            let bytes: Vec<u8> = dwords.iter().flat_map(|d| d.to_le_bytes()).collect();
            assert_eq!(rec.to_bytes(), bytes, "{}", rec.name());
        }
    }

    #[test]
    fn semaphore_wait_keeps_register_poll_default() {
        let rec = REGISTRY.define(InstructionKind::MiSemaphoreWait).unwrap();
        assert_eq!(rec.field("RegisterPollMode").unwrap(), 1);
        assert_eq!(rec.field("MiCommandOpcode").unwrap(), 28);
    }

    #[test]
    fn default_length_fields_match_size() {
        for def in REGISTRY.iter() {
            let rec = REGISTRY.define(def.kind).unwrap();
            if let Some(length) = rec.length() {
                assert_eq!(
                    length as usize,
                    compute_length(def.dword_count(), def.length_bias()),
                    "{}",
                    def.name
                );
            }
        }
    }

    #[test]
    fn tables_are_consistent() {
        for def in REGISTRY.iter() {
            for field in def.fields {
                assert!(
                    field.dword + field.dword_span() <= def.dword_count(),
                    "{}.{} lies outside the command",
                    def.name,
                    field.name
                );
                // Every default must be encodable through the table.
                assert!(
                    field.check(field.read(def.defaults)).is_ok(),
                    "{}.{}",
                    def.name,
                    field.name
                );
            }
            for name in def.opcode {
                assert_eq!(def.field(name).unwrap().dword, 0, "{}.{}", def.name, name);
            }
            if let Some(length) = def.length {
                assert!(matches!(def.field(length).unwrap().domain, Domain::Numeric));
            }
            for addr in def.addresses {
                assert!(def.field(addr.low).is_ok(), "{}.{}", def.name, addr.low);
                if let Some(high) = addr.high {
                    assert!(def.field(high).is_ok(), "{}.{}", def.name, high);
                }
            }
        }
    }

    #[test]
    fn headers_are_unambiguous() {
        for def in REGISTRY.iter() {
            let matches: Vec<_> = REGISTRY
                .iter()
                .filter(|d| d.matches(def.defaults[0]))
                .map(|d| d.name)
                .collect();
            assert_eq!(matches, vec![def.name]);
        }
    }
}
