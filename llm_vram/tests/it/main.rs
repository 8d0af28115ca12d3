mod cli;
mod properties;
mod scenarios;

use llm_vram::{Architecture, ArchitectureDescriptor};

pub(crate) fn llama_7b() -> ArchitectureDescriptor {
    ArchitectureDescriptor::builder()
        .name("llama-7b")
        .parameter_count(7_000_000_000)
        .embedding_length(4096)
        .block_count(32)
        .head_count(32)
        .feed_forward_length(11008)
        .context_length(4096)
        .build()
}

pub(crate) fn mistral_7b() -> ArchitectureDescriptor {
    ArchitectureDescriptor::builder()
        .name("mistral-7b")
        .architecture(Architecture::Llama)
        .parameter_count(7_241_732_096)
        .embedding_length(4096)
        .block_count(32)
        .head_count(32)
        .head_count_kv(8)
        .feed_forward_length(14336)
        .context_length(32768)
        .build()
}

pub(crate) fn tiny_llama() -> ArchitectureDescriptor {
    ArchitectureDescriptor::builder()
        .name("tinyllama-1.1b")
        .parameter_count(1_100_048_384)
        .embedding_length(2048)
        .block_count(22)
        .head_count(32)
        .head_count_kv(4)
        .feed_forward_length(5632)
        .context_length(2048)
        .build()
}
