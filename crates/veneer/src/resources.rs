mod descriptor;
pub use descriptor::{
    DescriptorPool, DescriptorTableUpdate, DescriptorWrite, Descriptors, SamplerWithView,
    bind_point_for_stages,
};

mod command_buffer;
pub use command_buffer::{CommandBuffer, CommandPool};

mod query_pool;
pub use query_pool::QueryPool;
