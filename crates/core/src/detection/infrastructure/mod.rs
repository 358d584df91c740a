pub mod detector_factory;
pub mod onnx_pose_detector;
pub mod onnx_session;
pub mod seeta_face_detector;
