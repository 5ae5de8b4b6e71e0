pub mod frame;
pub mod hit;
pub mod info_box;
pub mod paint;
pub mod route;
pub mod scene;

pub use frame::FrameScheduler;
pub use info_box::{ApproxMeasure, InfoBoxLayout, TextMeasure, info_box_layout, info_boxes};
pub use route::{EdgeGroups, EdgeRoute, PairKey, edge_offset_for_index, route_all, route_edge};
pub use scene::{DrawCmd, Highlights, RenderState, SceneTheme, TempEdge, build_display_list};
